// ==========================================
// 生产台账引擎 - 领域类型定义
// ==========================================
// 机台状态 / 模具状态 / 审计操作类型
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 机台状态 (Machine Status)
// ==========================================
// 同时作为工时区间 (time_log.status) 的状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Idle,      // 空闲（无班次）
    Running,   // 正常生产
    Stopped,   // 停机
    Emergency, // 紧急停机
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Idle => "IDLE",
            MachineStatus::Running => "RUNNING",
            MachineStatus::Stopped => "STOPPED",
            MachineStatus::Emergency => "EMERGENCY",
        }
    }

    /// 从数据库 / 调用方字符串解析
    ///
    /// NORMAL_RUNNING 是终端上报的正常生产别名，落库统一为 RUNNING
    /// 未知值返回 None，由调用方决定如何处理（不做静默降级）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IDLE" => Some(MachineStatus::Idle),
            "RUNNING" | "NORMAL_RUNNING" => Some(MachineStatus::Running),
            "STOPPED" => Some(MachineStatus::Stopped),
            "EMERGENCY" => Some(MachineStatus::Emergency),
            _ => None,
        }
    }

    /// 是否属于停机类状态（需要停机原因）
    pub fn is_stoppage(&self) -> bool {
        matches!(self, MachineStatus::Stopped | MachineStatus::Emergency)
    }

    /// 是否计入生产时间
    pub fn is_production(&self) -> bool {
        matches!(self, MachineStatus::Running)
    }
}

// ==========================================
// 模具状态 (Matrix Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatrixStatus {
    Running, // 生产中
    Stopped, // 停机
}

impl fmt::Display for MatrixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MatrixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixStatus::Running => "RUNNING",
            MatrixStatus::Stopped => "STOPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "RUNNING" => Some(MatrixStatus::Running),
            "STOPPED" => Some(MatrixStatus::Stopped),
            _ => None,
        }
    }

    /// 模具级转换只接受 RUNNING / STOPPED
    pub fn from_machine_status(status: MachineStatus) -> Option<Self> {
        match status {
            MachineStatus::Running => Some(MatrixStatus::Running),
            MachineStatus::Stopped => Some(MatrixStatus::Stopped),
            MachineStatus::Idle | MachineStatus::Emergency => None,
        }
    }
}

// ==========================================
// 审计操作类型 (Action Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    SessionStart,      // 开班
    SessionEnd,        // 收班
    MachineTransition, // 机台状态切换
    MatrixTransition,  // 模具状态切换
    AutoClose,         // 日界自动收班
    RecoveryClose,     // 遗留区间回收
    MatrixReconcile,   // 模具数量调整
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SessionStart => "SESSION_START",
            ActionType::SessionEnd => "SESSION_END",
            ActionType::MachineTransition => "MACHINE_TRANSITION",
            ActionType::MatrixTransition => "MATRIX_TRANSITION",
            ActionType::AutoClose => "AUTO_CLOSE",
            ActionType::RecoveryClose => "RECOVERY_CLOSE",
            ActionType::MatrixReconcile => "MATRIX_RECONCILE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
