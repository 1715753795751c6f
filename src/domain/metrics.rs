// ==========================================
// 生产台账引擎 - 统计口径与输出结构
// ==========================================
// 时间窗口 / 范围过滤 / 工时、帕累托、节拍统计结果
// ==========================================

use crate::domain::types::MachineStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// TimeWindow - 统计时间窗口 [start, end)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// 任意区间与窗口重叠部分的秒数
    pub fn overlap_seconds(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        let a = from.max(self.start);
        let b = to.min(self.end);
        (b - a).num_seconds().max(0)
    }
}

// ==========================================
// ScopeFilter - 统计范围
// ==========================================
// 各维度为空表示不过滤
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub company_id: Option<String>,
    pub group_ids: Vec<String>,
    pub machine_ids: Vec<String>,
    pub operator_ids: Vec<String>,
}

impl ScopeFilter {
    pub fn for_machine(machine_id: &str) -> Self {
        Self {
            machine_ids: vec![machine_id.to_string()],
            ..Default::default()
        }
    }

    pub fn for_company(company_id: &str) -> Self {
        Self {
            company_id: Some(company_id.to_string()),
            ..Default::default()
        }
    }
}

// ==========================================
// TimeMetrics - 工时统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDuration {
    pub status: Option<MachineStatus>,
    pub seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeMetrics {
    pub production_seconds: i64, // RUNNING
    pub stop_seconds: i64,       // STOPPED + EMERGENCY
    pub idle_seconds: i64,       // IDLE（不计入稼动率）
    pub efficiency_pct: f64,     // production / (production + stop) * 100
    pub by_status: Vec<StatusDuration>,
}

// ==========================================
// ParetoEntry - 停机帕累托
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoEntry {
    pub stop_reason_id: Option<String>, // None = 未指定原因
    pub reason_name: String,
    pub category: Option<String>,
    pub total_seconds: i64,
    pub occurrences: i64,
    pub percentage: f64,            // 占剩余总停机时间比例 (0-100)
    pub cumulative_percentage: f64, // 累计比例 (0-100)
}

// ==========================================
// CycleMetrics - 节拍统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub cycle_count: i64,
    pub target_cycles: i64,
    pub completion_pct: f64,
}

// ==========================================
// ActiveTime - 单机台窗口内工时
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveTime {
    pub machine_id: String,
    pub running_seconds: i64,
    pub tracked_seconds: i64,
    pub has_open_interval: bool,
}

/// 安全百分比（分母为 0 返回 0）
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
