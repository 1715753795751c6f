// ==========================================
// 生产台账引擎 - 应用状态
// ==========================================
// 职责: 显式构造共享依赖与各 API 实例，持有自动收班后台任务
// 说明: 无进程级单例；调度器由调用方显式启动 / 停止
// ==========================================

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::api::{MetricsApi, ProductionApi, ResourceApi};
use crate::config::{ConfigManager, LedgerSettings};
use crate::db::open_shared_connection;
use crate::engine::{
    AutoCloseScheduler, GroupMembershipDirectory, LedgerContext, MachineLockManager, SystemClock,
};
use crate::repository::ActionLogRepository;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生效的运行参数
    pub settings: LedgerSettings,

    /// 引擎共享依赖
    pub ctx: LedgerContext,

    /// 生产台账API
    pub production_api: Arc<ProductionApi>,

    /// 统计API
    pub metrics_api: Arc<MetricsApi>,

    /// 基础资料API
    pub resource_api: Arc<ResourceApi>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    scheduler: Arc<AutoCloseScheduler>,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在则创建并建表）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_shared_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let settings =
            LedgerSettings::load(&config_manager).map_err(|e| format!("无法读取配置: {}", e))?;
        match config_manager.get_config_snapshot() {
            Ok(snapshot) => tracing::debug!(snapshot = %snapshot, "配置快照"),
            Err(e) => tracing::warn!("读取配置快照失败: {}", e),
        }

        let ctx = LedgerContext::new(
            conn,
            Arc::new(SystemClock),
            Arc::new(MachineLockManager::new(settings.machine_lock_wait())),
            Arc::new(GroupMembershipDirectory),
        );

        Ok(Self::with_context(db_path, ctx, config_manager, settings))
    }

    /// 使用外部构造的依赖创建（测试注入手动时钟等）
    pub fn with_context(
        db_path: String,
        ctx: LedgerContext,
        config_manager: Arc<ConfigManager>,
        settings: LedgerSettings,
    ) -> Self {
        let production_api = Arc::new(ProductionApi::new(
            ctx.clone(),
            settings.day_boundary,
            settings.abandoned_log_threshold(),
        ));
        let metrics_api = Arc::new(MetricsApi::new(ctx.clone()));
        let resource_api = Arc::new(ResourceApi::new(ctx.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(ctx.conn.clone()));
        let scheduler = Arc::new(AutoCloseScheduler::new(ctx.clone(), settings.day_boundary));

        tracing::info!(
            day_boundary = %settings.day_boundary.at,
            lock_wait_ms = settings.machine_lock_wait_ms,
            auto_close = settings.auto_close_enabled,
            "AppState初始化完成"
        );

        Self {
            db_path,
            settings,
            ctx,
            production_api,
            metrics_api,
            resource_api,
            action_log_repo,
            config_manager,
            scheduler,
            scheduler_task: Mutex::new(None),
        }
    }

    pub fn scheduler(&self) -> Arc<AutoCloseScheduler> {
        self.scheduler.clone()
    }

    /// 启动日界自动收班（须在 tokio 运行时内调用）
    ///
    /// 配置关闭或已在运行时返回 false
    pub fn start_scheduler(&self) -> Result<bool, String> {
        if !self.settings.auto_close_enabled {
            tracing::info!("自动收班已在配置中关闭");
            return Ok(false);
        }

        let mut task = self
            .scheduler_task
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?;
        if task.as_ref().map_or(false, |h| !h.is_finished()) {
            return Ok(false);
        }

        *task = Some(tokio::spawn(Arc::clone(&self.scheduler).run()));
        Ok(true)
    }

    /// 停止自动收班并等待后台任务退出
    pub async fn stop_scheduler(&self) -> Result<(), String> {
        let handle = self
            .scheduler_task
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?
            .take();

        if let Some(handle) = handle {
            self.scheduler.stop();
            handle
                .await
                .map_err(|e| format!("自动收班任务异常退出: {}", e))?;
        }
        Ok(())
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler_task
            .lock()
            .map(|t| t.as_ref().map_or(false, |h| !h.is_finished()))
            .unwrap_or(false)
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 PRODUCTION_LEDGER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("PRODUCTION_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./production_ledger.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("production-ledger");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("production_ledger.db");
        }
    }

    path.to_string_lossy().to_string()
}
