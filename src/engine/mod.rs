// ==========================================
// 生产台账引擎 - 引擎层
// ==========================================
// 职责: 会话 / 状态切换 / 收班 / 回收 / 统计等业务规则
// 红线: 引擎不拼 SQL，所有写入经 repository 的 *_in 函数在同一事务内完成
// 红线: 加锁顺序固定为 机台锁 -> 连接锁
// ==========================================

pub mod batch;
pub mod clock;
pub mod context;
pub mod cycle;
pub mod directory;
pub mod error;
pub mod machine_lock;
pub mod metrics;
pub mod recovery;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transition;

#[cfg(test)]
mod test_support;

// 重导出核心引擎
pub use batch::{BatchFailure, BatchReport};
pub use clock::{Clock, DayBoundary, ManualClock, SystemClock};
pub use context::LedgerContext;
pub use cycle::CycleRecorder;
pub use directory::{AllowAllDirectory, GroupMembershipDirectory, OperatorDirectory};
pub use error::{EngineError, EngineResult};
pub use machine_lock::{MachineLockGuard, MachineLockManager, DEFAULT_LOCK_WAIT_MS};
pub use metrics::MetricsAggregator;
pub use recovery::RecoverySweep;
pub use registry::ResourceRegistry;
pub use scheduler::AutoCloseScheduler;
pub use session::{SessionClosure, SessionManager};
pub use transition::{StatusTransitionEngine, TransitionOutcome, TransitionRequest, TransitionScope};
