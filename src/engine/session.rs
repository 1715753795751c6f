// ==========================================
// 生产台账引擎 - 生产会话管理
// ==========================================
// 开班: 建会话 + 机台置 RUNNING + 打开初始整机区间
// 收班: 关闭会话下全部未关闭区间 + 会话失效 + 机台置 IDLE
// 红线: 收班后该会话不得遗留未关闭区间
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::session::ProductionSession;
use crate::domain::time_log::OpenTimeLog;
use crate::domain::types::{ActionType, MachineStatus, MatrixStatus};
use crate::engine::context::LedgerContext;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::transition::close_intervals_in;
use crate::perf::PerfGuard;
use crate::repository::{
    ActionLogRepository, MachineRepository, SessionRepository, TimeLogRepository,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClosure {
    pub session_id: String,
    pub machine_id: String,
    pub ended_at: NaiveDateTime,
    pub closed_time_logs: usize,
}

pub struct SessionManager {
    ctx: LedgerContext,
}

impl SessionManager {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// 开班
    ///
    /// 同一操作员重复开班返回已有会话；机台被其他操作员占用时返回 AlreadyActive
    pub fn start_session(&self, machine_id: &str, operator_id: &str) -> EngineResult<ProductionSession> {
        let _perf = PerfGuard::new("start_session");
        let _machine_lock = self.ctx.locks.acquire(machine_id)?;
        let now = self.ctx.now();

        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;

        let machine = MachineRepository::find_by_id_in(&tx, machine_id)?
            .ok_or_else(|| EngineError::not_found("Machine", machine_id))?;

        if let Some(active) = SessionRepository::find_active_by_machine_in(&tx, machine_id)? {
            if active.operator_id == operator_id {
                return Ok(active);
            }
            return Err(EngineError::AlreadyActive {
                machine_id: machine_id.to_string(),
                owner_operator_id: active.operator_id,
            });
        }

        if !self.ctx.directory.can_operate(&tx, operator_id, &machine)? {
            return Err(EngineError::InvalidTransition(format!(
                "操作员 {} 无权操作机台 {}",
                operator_id, machine.code
            )));
        }

        let session = ProductionSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            company_id: machine.company_id.clone(),
            machine_id: machine.machine_id.clone(),
            operator_id: operator_id.to_string(),
            started_at: now,
            ended_at: None,
            active: true,
        };
        SessionRepository::insert_in(&tx, &session)?;

        MachineRepository::update_status_in(&tx, machine_id, MachineStatus::Running, Some(operator_id), now)?;
        MachineRepository::reset_matrices_in(&tx, machine_id, MatrixStatus::Running)?;

        let opened = TimeLogRepository::insert_open_in(
            &tx,
            &OpenTimeLog {
                company_id: machine.company_id.clone(),
                session_id: session.session_id.clone(),
                machine_id: machine.machine_id.clone(),
                matrix_id: None,
                matrix_number: None,
                operator_id: operator_id.to_string(),
                status: MachineStatus::Running,
                stop_reason_id: None,
                started_at: now,
            },
        )?;

        ActionLogRepository::insert_in(
            &tx,
            &ActionLog::new(
                ActionType::SessionStart,
                operator_id,
                now,
                Some(&machine.company_id),
                Some(machine_id),
                Some(&session.session_id),
            )
            .with_payload(json!({
                "from": machine.status.as_str(),
                "opened_time_log_id": opened.time_log_id,
            })),
        )?;

        tx.commit()?;

        info!(machine_id, operator_id, session_id = %session.session_id, "开班");
        Ok(session)
    }

    /// 收班
    pub fn end_session(&self, machine_id: &str, operator_id: &str) -> EngineResult<SessionClosure> {
        let _perf = PerfGuard::new("end_session");
        let _machine_lock = self.ctx.locks.acquire(machine_id)?;
        let now = self.ctx.now();

        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;

        if MachineRepository::find_by_id_in(&tx, machine_id)?.is_none() {
            return Err(EngineError::not_found("Machine", machine_id));
        }
        let session = SessionRepository::find_active_in(&tx, machine_id, operator_id)?.ok_or_else(|| {
            EngineError::NoActiveSession {
                machine_id: machine_id.to_string(),
                operator_id: operator_id.to_string(),
            }
        })?;

        let closure = close_session_in(&tx, &session, now, operator_id, ActionType::SessionEnd)?;
        tx.commit()?;

        info!(
            machine_id,
            operator_id,
            session_id = %closure.session_id,
            closed = closure.closed_time_logs,
            "收班"
        );
        Ok(closure)
    }
}

/// 关闭会话（收班 / 自动收班共用，调用方持有机台锁并提供事务）
pub(crate) fn close_session_in(
    conn: &Connection,
    session: &ProductionSession,
    now: NaiveDateTime,
    actor: &str,
    action_type: ActionType,
) -> EngineResult<SessionClosure> {
    let open = TimeLogRepository::find_open_in(conn, &session.session_id, &session.machine_id)?;
    let closed = close_intervals_in(conn, open, now)?;

    SessionRepository::close_in(conn, &session.session_id, now)?;
    MachineRepository::update_status_in(conn, &session.machine_id, MachineStatus::Idle, None, now)?;
    MachineRepository::reset_matrices_in(conn, &session.machine_id, MatrixStatus::Running)?;

    ActionLogRepository::insert_in(
        conn,
        &ActionLog::new(
            action_type,
            actor,
            now,
            Some(&session.company_id),
            Some(&session.machine_id),
            Some(&session.session_id),
        )
        .with_payload(json!({
            "operator_id": session.operator_id,
            "elapsed_seconds": session.elapsed_seconds(now),
            "closed_time_log_ids": closed.iter().map(|l| l.time_log_id.as_str()).collect::<Vec<_>>(),
        })),
    )?;

    Ok(SessionClosure {
        session_id: session.session_id.clone(),
        machine_id: session.machine_id.clone(),
        ended_at: now,
        closed_time_logs: closed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{fixture, t0};
    use crate::repository::ActionLogRepository;

    #[test]
    fn test_start_session_opens_initial_machine_interval() {
        let fx = fixture();
        let sessions = SessionManager::new(fx.ctx.clone());

        let session = sessions.start_session("m0", "op1").unwrap();
        assert!(session.active);
        assert_eq!(session.started_at, t0());

        let machine = fx.machine("m0");
        assert_eq!(machine.status, MachineStatus::Running);
        assert_eq!(machine.current_operator_id.as_deref(), Some("op1"));

        let open = fx.open_logs("m0");
        assert_eq!(open.len(), 1);
        assert!(open[0].is_machine_wide());
        assert_eq!(open[0].status, MachineStatus::Running);
        assert_eq!(open[0].started_at, t0());
    }

    #[test]
    fn test_start_session_by_other_operator_is_already_active() {
        let fx = fixture();
        let sessions = SessionManager::new(fx.ctx.clone());
        sessions.start_session("m0", "op1").unwrap();

        let err = sessions.start_session("m0", "op2").unwrap_err();
        assert!(matches!(
            err,
            EngineError::AlreadyActive { ref owner_operator_id, .. } if owner_operator_id == "op1"
        ));
    }

    #[test]
    fn test_start_session_twice_by_owner_returns_same_session() {
        let fx = fixture();
        let sessions = SessionManager::new(fx.ctx.clone());
        let first = sessions.start_session("m0", "op1").unwrap();
        fx.advance(60);
        let second = sessions.start_session("m0", "op1").unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(fx.open_logs("m0").len(), 1);
    }

    #[test]
    fn test_start_session_unknown_machine() {
        let fx = fixture();
        let err = SessionManager::new(fx.ctx.clone())
            .start_session("nope", "op1")
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_end_session_without_session() {
        let fx = fixture();
        let err = SessionManager::new(fx.ctx.clone())
            .end_session("m0", "op1")
            .unwrap_err();
        assert!(matches!(err, EngineError::NoActiveSession { .. }));
    }

    #[test]
    fn test_end_session_closes_everything_and_resets_machine() {
        let fx = fixture();
        let sessions = SessionManager::new(fx.ctx.clone());
        let session = sessions.start_session("m0", "op1").unwrap();
        fx.advance(3600);

        let closure = sessions.end_session("m0", "op1").unwrap();
        assert_eq!(closure.closed_time_logs, 1);
        assert!(fx.open_logs("m0").is_empty());

        let machine = fx.machine("m0");
        assert_eq!(machine.status, MachineStatus::Idle);
        assert_eq!(machine.current_operator_id, None);

        let logs = fx.session_logs(&session.session_id);
        assert_eq!(logs[0].duration_seconds, Some(3600));

        let audit = ActionLogRepository::new(fx.ctx.conn.clone())
            .find_by_session(&session.session_id)
            .unwrap();
        let kinds: Vec<&str> = audit.iter().map(|a| a.action_type.as_str()).collect();
        assert_eq!(kinds, vec!["SESSION_START", "SESSION_END"]);
    }

    #[test]
    fn test_new_session_after_end() {
        let fx = fixture();
        let sessions = SessionManager::new(fx.ctx.clone());
        let first = sessions.start_session("m0", "op1").unwrap();
        fx.advance(60);
        sessions.end_session("m0", "op1").unwrap();

        let second = sessions.start_session("m0", "op2").unwrap();
        assert_ne!(first.session_id, second.session_id);
    }
}
