// ==========================================
// 生产台账引擎 - 工时区间 / 节拍记录
// ==========================================
// 对齐: time_log / cycle_log 表
// 红线: 同一 (会话, 机台, matrix_id) 至多一条 ended_at IS NULL 的区间
// 红线: 区间关闭后不可再修改
// ==========================================

use crate::domain::types::MachineStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// TimeLog - 工时区间
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    // ===== 主键与归属 =====
    pub time_log_id: String,
    pub company_id: String,
    pub session_id: String,
    pub machine_id: String,
    pub matrix_id: Option<String>,    // null 表示机台整体区间
    pub matrix_number: Option<i32>,   // 冗余字段，便于报表
    pub operator_id: String,

    // ===== 状态 =====
    pub status: MachineStatus,
    pub stop_reason_id: Option<String>, // 仅停机类状态有意义

    // ===== 时间 =====
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>, // null 表示区间未关闭
    pub duration_seconds: Option<i64>,   // 关闭时一次性写入
}

impl TimeLog {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn is_machine_wide(&self) -> bool {
        self.matrix_id.is_none()
    }

    /// 区间在 [window_start, window_end) 内的有效秒数
    ///
    /// 未关闭的区间按 now 计算；now 早于窗口起点时贡献为 0
    pub fn clipped_seconds(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        let from = self.started_at.max(window_start);
        let to = end.min(window_end);
        (to - from).num_seconds().max(0)
    }
}

// ==========================================
// OpenTimeLog - 新区间写入参数
// ==========================================
#[derive(Debug, Clone)]
pub struct OpenTimeLog {
    pub company_id: String,
    pub session_id: String,
    pub machine_id: String,
    pub matrix_id: Option<String>,
    pub matrix_number: Option<i32>,
    pub operator_id: String,
    pub status: MachineStatus,
    pub stop_reason_id: Option<String>,
    pub started_at: NaiveDateTime,
}

// ==========================================
// CycleLog - 节拍完成记录 (只追加)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleLog {
    pub cycle_log_id: String,
    pub session_id: String,
    pub machine_id: String,
    pub matrix_id: Option<String>,
    pub operator_id: String,
    pub completed_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn log(start: NaiveDateTime, end: Option<NaiveDateTime>) -> TimeLog {
        TimeLog {
            time_log_id: "t1".to_string(),
            company_id: "c1".to_string(),
            session_id: "s1".to_string(),
            machine_id: "m1".to_string(),
            matrix_id: None,
            matrix_number: None,
            operator_id: "op1".to_string(),
            status: MachineStatus::Running,
            stop_reason_id: None,
            started_at: start,
            ended_at: end,
            duration_seconds: end.map(|e| (e - start).num_seconds()),
        }
    }

    #[test]
    fn test_clipped_seconds_inside_window() {
        let l = log(at(8, 0), Some(at(9, 0)));
        assert_eq!(l.clipped_seconds(at(7, 0), at(10, 0), at(12, 0)), 3600);
    }

    #[test]
    fn test_clipped_seconds_straddling_both_edges() {
        let l = log(at(7, 0), Some(at(11, 0)));
        assert_eq!(l.clipped_seconds(at(8, 0), at(9, 30), at(12, 0)), 5400);
    }

    #[test]
    fn test_clipped_seconds_open_interval_counts_up_to_now() {
        let l = log(at(8, 0), None);
        assert_eq!(l.clipped_seconds(at(8, 0), at(12, 0), at(9, 0)), 3600);
        // now 在窗口之前
        assert_eq!(l.clipped_seconds(at(10, 0), at(12, 0), at(9, 0)), 0);
    }

    #[test]
    fn test_clipped_seconds_outside_window() {
        let l = log(at(6, 0), Some(at(7, 0)));
        assert_eq!(l.clipped_seconds(at(8, 0), at(9, 0), at(12, 0)), 0);
    }
}
