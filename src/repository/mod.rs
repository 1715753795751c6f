// ==========================================
// 生产台账引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约定: `*_in(conn, ..)` 在调用方事务内执行; `&self` 方法自行加锁
// ==========================================

pub mod action_log_repo;
pub mod cycle_log_repo;
pub mod error;
pub mod machine_repo;
pub mod operator_repo;
pub mod scope_sql;
pub mod session_repo;
pub mod stop_reason_repo;
pub mod time_log_repo;

pub use action_log_repo::ActionLogRepository;
pub use cycle_log_repo::CycleLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use machine_repo::MachineRepository;
pub use operator_repo::OperatorGroupRepository;
pub use session_repo::SessionRepository;
pub use stop_reason_repo::StopReasonRepository;
pub use time_log_repo::TimeLogRepository;
