// ==========================================
// 生产台账引擎 - 引擎层错误类型
// ==========================================
// 台账操作的领域错误分类；存储错误经 From<RepositoryError> 归类
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// 机台 / 模具 / 会话 / 停机原因不存在
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无进行中的生产会话: machine_id={machine_id}, operator_id={operator_id}")]
    NoActiveSession {
        machine_id: String,
        operator_id: String,
    },

    #[error("机台已被其他操作员占用: machine_id={machine_id}, operator_id={owner_operator_id}")]
    AlreadyActive {
        machine_id: String,
        owner_operator_id: String,
    },

    #[error("无效的状态切换: {0}")]
    InvalidTransition(String),

    /// 调用方可重试
    #[error("并发冲突: {0}")]
    ConcurrencyConflict(String),

    #[error("持久化失败: {0}")]
    PersistenceFailure(String),
}

impl EngineError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound(format!("{}(id={})", entity, id))
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => EngineError::not_found(&entity, id),
            RepositoryError::LockError(msg) => EngineError::ConcurrencyConflict(msg),
            // 部分唯一索引兜底命中: 另一写入者已抢先
            ref e if e.is_concurrent_write_conflict() => EngineError::ConcurrencyConflict(e.to_string()),
            other => EngineError::PersistenceFailure(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
