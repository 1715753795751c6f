// ==========================================
// 生产台账引擎 - API层错误类型
// ==========================================
// 职责: 对调用方暴露的错误分类，引擎错误一一对应，外加入参校验错误
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 入参校验
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 台账业务错误
    // ==========================================
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

    // ==========================================
    // 并发 / 存储
    // ==========================================
    #[error("并发冲突: {0}")]
    ConcurrencyConflict(String),

    #[error("持久化失败: {0}")]
    PersistenceFailure(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的错误码（供前端 / 调用方分支）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NoActiveSession { .. } => "NO_ACTIVE_SESSION",
            ApiError::AlreadyActive { .. } => "ALREADY_ACTIVE",
            ApiError::InvalidTransition(_) => "INVALID_TRANSITION",
            ApiError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            ApiError::PersistenceFailure(_) | ApiError::Other(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// 仅并发冲突可直接重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::ConcurrencyConflict(_))
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// 序列化后的错误体
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::NoActiveSession {
                machine_id,
                operator_id,
            } => ApiError::NoActiveSession {
                machine_id,
                operator_id,
            },
            EngineError::AlreadyActive {
                machine_id,
                owner_operator_id,
            } => ApiError::AlreadyActive {
                machine_id,
                owner_operator_id,
            },
            EngineError::InvalidTransition(msg) => ApiError::InvalidTransition(msg),
            EngineError::ConcurrencyConflict(msg) => ApiError::ConcurrencyConflict(msg),
            EngineError::PersistenceFailure(msg) => ApiError::PersistenceFailure(msg),
        }
    }
}

// 只读查询直接走仓储，按引擎口径归类
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        EngineError::from(err).into()
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
