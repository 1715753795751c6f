// ==========================================
// 生产台账引擎 - 引擎共享依赖
// ==========================================
// 职责: 聚合各台账引擎共用的连接 / 时钟 / 机台锁 / 操作员目录
// 说明: 显式构造后注入，不使用进程级单例
// ==========================================

use crate::db::SharedConnection;
use crate::engine::clock::Clock;
use crate::engine::directory::OperatorDirectory;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::machine_lock::MachineLockManager;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use std::sync::{Arc, MutexGuard};

#[derive(Clone)]
pub struct LedgerContext {
    pub conn: SharedConnection,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<MachineLockManager>,
    pub directory: Arc<dyn OperatorDirectory>,
}

impl LedgerContext {
    pub fn new(
        conn: SharedConnection,
        clock: Arc<dyn Clock>,
        locks: Arc<MachineLockManager>,
        directory: Arc<dyn OperatorDirectory>,
    ) -> Self {
        Self {
            conn,
            clock,
            locks,
            directory,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// 获取数据库连接（须在机台锁之后调用）
    pub fn lock_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::ConcurrencyConflict(format!("数据库锁获取失败: {}", e)))
    }
}
