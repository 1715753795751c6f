// ==========================================
// 生产台账引擎 - 生产会话领域模型
// ==========================================
// 一个会话 = 一名操作员在一台机台上的一个班次
// 红线: 同一 (机台, 操作员) 任一时刻至多一个 active 会话
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSession {
    pub session_id: String,
    pub company_id: String,
    pub machine_id: String,
    pub operator_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>, // null 表示进行中
    pub active: bool,
}

impl ProductionSession {
    /// 会话持续秒数（进行中的会话算到 now）
    pub fn elapsed_seconds(&self, now: NaiveDateTime) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_seconds().max(0)
    }
}
