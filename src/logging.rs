// ==========================================
// 生产台账引擎 - 日志初始化
// ==========================================
// tracing + tracing-subscriber，级别取自 RUST_LOG
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// 初始化进程日志
///
/// # 环境变量
/// - RUST_LOG: 过滤器（默认 info），例如 `RUST_LOG=production_ledger=debug,slow_sql=warn`
///
/// # 示例
/// ```no_run
/// use production_ledger::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// 测试用日志（可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("production_ledger=debug"))
        .with_test_writer()
        .try_init();
}
