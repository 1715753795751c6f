// ==========================================
// 生产台账引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 机台/模具状态台账、班次会话与稼动率统计
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能追踪
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 依赖组装与后台任务
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ActionType, MachineStatus, MatrixStatus};

// 领域实体
pub use domain::{
    ActionLog, ActiveTime, CycleLog, CycleMetrics, Machine, Matrix, NewMachine, ParetoEntry,
    ProductionSession, ScopeFilter, StopReason, TimeLog, TimeMetrics, TimeWindow,
};

// 引擎
pub use engine::{
    AutoCloseScheduler, BatchReport, DayBoundary, EngineError, LedgerContext, MetricsAggregator,
    RecoverySweep, ResourceRegistry, SessionManager, StatusTransitionEngine,
};

// API
pub use api::{ApiError, ApiResult, MetricsApi, ProductionApi, ResourceApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产台账引擎";
