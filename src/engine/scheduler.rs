// ==========================================
// 生产台账引擎 - 日界自动收班
// ==========================================
// 每日在日界时刻强制关闭全系统所有 active 会话
// 逐会话独立加锁 + 独立事务，单个失败只记录，不中断其余会话
// 后台任务由 AppState 显式启动 / 停止
// ==========================================

use crate::domain::action_log::SYSTEM_ACTOR;
use crate::domain::session::ProductionSession;
use crate::domain::types::ActionType;
use crate::engine::batch::BatchReport;
use crate::engine::clock::DayBoundary;
use crate::engine::context::LedgerContext;
use crate::engine::error::EngineResult;
use crate::engine::session::close_session_in;
use crate::perf::PerfGuard;
use crate::repository::SessionRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub struct AutoCloseScheduler {
    ctx: LedgerContext,
    boundary: DayBoundary,
    shutdown: Arc<Notify>,
}

impl AutoCloseScheduler {
    pub fn new(ctx: LedgerContext, boundary: DayBoundary) -> Self {
        Self {
            ctx,
            boundary,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// 执行一次全量自动收班
    pub fn run_once(&self) -> EngineResult<BatchReport> {
        let _perf = PerfGuard::new("auto_close");
        let active = SessionRepository::new(self.ctx.conn.clone()).list_active()?;

        let mut report = BatchReport::default();
        for session in &active {
            match self.close_one(session) {
                Ok(true) => report.record_success(1),
                Ok(false) => report.record_skipped(),
                Err(e) => {
                    warn!(
                        session_id = %session.session_id,
                        machine_id = %session.machine_id,
                        error = %e,
                        "自动收班失败"
                    );
                    report.record_failure(&session.session_id, &session.machine_id, e.to_string());
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "日界自动收班完成"
        );
        Ok(report)
    }

    /// 返回 false 表示会话在加锁前已被正常收班
    fn close_one(&self, listed: &ProductionSession) -> EngineResult<bool> {
        let _machine_lock = self.ctx.locks.acquire(&listed.machine_id)?;
        let now = self.ctx.now();

        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;

        // 列表到加锁之间会话可能已被正常收班
        let session = match SessionRepository::find_by_id_in(&tx, &listed.session_id)? {
            Some(s) if s.active => s,
            _ => return Ok(false),
        };

        close_session_in(&tx, &session, now, SYSTEM_ACTOR, ActionType::AutoClose)?;
        tx.commit()?;
        Ok(true)
    }

    /// 后台循环: 睡到下一个日界 -> 收班，直到收到停止信号
    pub async fn run(self: Arc<Self>) {
        info!(boundary = %self.boundary.at, "自动收班调度已启动");

        loop {
            let now = self.ctx.now();
            let next = self.boundary.next_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("自动收班调度已停止");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let this = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || this.run_once()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "自动收班执行失败"),
                        Err(e) => error!(error = %e, "自动收班任务异常退出"),
                    }
                }
            }
        }
    }

    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}
