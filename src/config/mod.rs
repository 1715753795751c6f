// ==========================================
// 生产台账引擎 - 配置层
// ==========================================
// 职责: 系统配置读取与类型化
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use settings::LedgerSettings;
