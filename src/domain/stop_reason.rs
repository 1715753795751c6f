// ==========================================
// 生产台账引擎 - 停机原因
// ==========================================
// 每个公司预置一条系统原因 "班次结束"，永远排除在帕累托之外
// ==========================================

use serde::{Deserialize, Serialize};

/// 系统预置原因名称
pub const SHIFT_ENDED_REASON_NAME: &str = "班次结束";

/// 系统预置原因分类
pub const SYSTEM_REASON_CATEGORY: &str = "SYSTEM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReason {
    pub stop_reason_id: String,
    pub company_id: String,
    pub name: String,
    pub category: String,
    pub exclude_from_pareto: bool,
    pub is_system: bool, // 系统预置（不可删除）
}
