// ==========================================
// 生产台账引擎 - 操作日志领域模型
// ==========================================
// 红线: 所有台账写入必须在同一事务内留痕
// 用途: 审计追踪（区间切分与操作员动作一一对应）
// 对齐: action_log 表
// ==========================================

use crate::domain::types::ActionType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    // ===== 主键 =====
    pub action_id: String,
    pub company_id: Option<String>, // 系统级操作可为None
    pub action_type: String,        // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,              // 操作员ID 或 "system"

    // ===== 关联对象 =====
    pub machine_id: Option<String>,
    pub session_id: Option<String>,

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

/// 系统动作的 actor 标识
pub const SYSTEM_ACTOR: &str = "system";

impl ActionLog {
    /// 构造一条操作日志
    pub fn new(
        action_type: ActionType,
        actor: &str,
        action_ts: NaiveDateTime,
        company_id: Option<&str>,
        machine_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.map(str::to_string),
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor: actor.to_string(),
            machine_id: machine_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
