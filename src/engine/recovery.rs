// ==========================================
// 生产台账引擎 - 遗留区间回收
// ==========================================
// 关闭开始时间早于 (now - older_than) 且仍未关闭的区间，结束时间取 now
// 按需调用（管理操作），不自动执行
// 按机台加锁；每个区间独立事务，失败逐项记录
// ==========================================

use crate::domain::action_log::{ActionLog, SYSTEM_ACTOR};
use crate::domain::time_log::TimeLog;
use crate::domain::types::ActionType;
use crate::engine::batch::BatchReport;
use crate::engine::context::LedgerContext;
use crate::engine::error::{EngineError, EngineResult};
use crate::perf::PerfGuard;
use crate::repository::{ActionLogRepository, TimeLogRepository};
use chrono::{Duration, NaiveDateTime};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub struct RecoverySweep {
    ctx: LedgerContext,
}

impl RecoverySweep {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn close_abandoned(&self, older_than: Duration) -> EngineResult<BatchReport> {
        let _perf = PerfGuard::new("close_abandoned");
        if older_than <= Duration::zero() {
            return Err(EngineError::InvalidTransition(format!(
                "回收阈值必须为正: {}s",
                older_than.num_seconds()
            )));
        }

        // 阈值早于可表示的最早时刻: 不可能有候选区间
        let cutoff = match self.ctx.now().checked_sub_signed(older_than) {
            Some(cutoff) => cutoff,
            None => return Ok(BatchReport::default()),
        };
        let stale = TimeLogRepository::new(self.ctx.conn.clone()).find_abandoned(cutoff)?;

        let mut by_machine: BTreeMap<String, Vec<TimeLog>> = BTreeMap::new();
        for log in stale {
            by_machine.entry(log.machine_id.clone()).or_default().push(log);
        }

        let mut report = BatchReport::default();
        for (machine_id, logs) in by_machine {
            let _machine_lock = match self.ctx.locks.acquire(&machine_id) {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(machine_id = %machine_id, error = %e, "回收跳过机台");
                    for log in &logs {
                        report.record_failure(&log.time_log_id, &machine_id, e.to_string());
                    }
                    continue;
                }
            };

            for log in &logs {
                match self.close_one(log, cutoff) {
                    Ok(true) => report.record_success(1),
                    Ok(false) => report.record_skipped(),
                    Err(e) => {
                        warn!(time_log_id = %log.time_log_id, machine_id = %machine_id, error = %e, "回收区间失败");
                        report.record_failure(&log.time_log_id, &machine_id, e.to_string());
                    }
                }
            }
        }

        info!(
            cutoff = %cutoff,
            closed = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "遗留区间回收完成"
        );
        Ok(report)
    }

    /// 返回 false 表示该区间在加锁前已被其他流程关闭
    fn close_one(&self, listed: &TimeLog, cutoff: NaiveDateTime) -> EngineResult<bool> {
        let now = self.ctx.now();
        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;

        let log = match TimeLogRepository::find_by_id_in(&tx, &listed.time_log_id)? {
            Some(l) if l.is_open() && l.started_at < cutoff => l,
            _ => return Ok(false),
        };

        if !TimeLogRepository::close_in(&tx, &log, now)? {
            return Ok(false);
        }

        ActionLogRepository::insert_in(
            &tx,
            &ActionLog::new(
                ActionType::RecoveryClose,
                SYSTEM_ACTOR,
                now,
                Some(&log.company_id),
                Some(&log.machine_id),
                Some(&log.session_id),
            )
            .with_payload(json!({
                "time_log_id": log.time_log_id,
                "matrix_number": log.matrix_number,
                "status": log.status.as_str(),
                "started_at": log.started_at.to_string(),
                "duration_seconds": (now - log.started_at).num_seconds(),
            }))
            .with_detail(format!("区间开始于 {}，超过回收阈值仍未关闭", log.started_at)),
        )?;

        tx.commit()?;
        Ok(true)
    }
}
