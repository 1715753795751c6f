// ==========================================
// 生产台账引擎 - 服务主入口
// ==========================================
// 启动: 初始化日志 -> 打开数据库 -> 启动日界自动收班 -> 等待 Ctrl-C
// ==========================================

use production_ledger::app::{get_default_db_path, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    production_ledger::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", production_ledger::APP_NAME);
    tracing::info!("系统版本: {}", production_ledger::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path)?;
    if app_state.start_scheduler()? {
        tracing::info!(boundary = %app_state.settings.day_boundary.at, "日界自动收班已启动");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("收到退出信号，正在停止...");

    app_state.stop_scheduler().await?;
    tracing::info!("已退出");
    Ok(())
}
