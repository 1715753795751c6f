// ==========================================
// 生产台账引擎 - API 层
// ==========================================
// 职责: 对外暴露的进程内调用接口（路由/HTTP 层不在本 crate）
// ==========================================

pub mod error;
pub mod metrics_api;
pub mod production_api;
pub mod resource_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use metrics_api::MetricsApi;
pub use production_api::{ProductionApi, ShiftStart};
pub use resource_api::ResourceApi;
