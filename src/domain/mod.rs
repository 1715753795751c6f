// ==========================================
// 生产台账引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、统计口径
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod machine;
pub mod metrics;
pub mod session;
pub mod stop_reason;
pub mod time_log;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, SYSTEM_ACTOR};
pub use machine::{Machine, Matrix, NewMachine};
pub use metrics::{
    ActiveTime, CycleMetrics, ParetoEntry, ScopeFilter, StatusDuration, TimeMetrics, TimeWindow,
};
pub use session::ProductionSession;
pub use stop_reason::{StopReason, SHIFT_ENDED_REASON_NAME, SYSTEM_REASON_CATEGORY};
pub use time_log::{CycleLog, OpenTimeLog, TimeLog};
pub use types::{ActionType, MachineStatus, MatrixStatus};
