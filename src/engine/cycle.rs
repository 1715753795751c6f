// ==========================================
// 生产台账引擎 - 节拍记录
// ==========================================
// 节拍只追加，要求 (机台, 操作员) 有进行中的会话
// ==========================================

use crate::domain::time_log::CycleLog;
use crate::engine::context::LedgerContext;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{CycleLogRepository, MachineRepository, SessionRepository};
use tracing::debug;

pub struct CycleRecorder {
    ctx: LedgerContext,
}

impl CycleRecorder {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn record_cycle(
        &self,
        machine_id: &str,
        matrix_id: Option<&str>,
        operator_id: &str,
    ) -> EngineResult<CycleLog> {
        // 与收班串行，避免节拍落在已结束的会话上
        let _machine_lock = self.ctx.locks.acquire(machine_id)?;
        let now = self.ctx.now();
        let conn = self.ctx.lock_conn()?;

        if MachineRepository::find_by_id_in(&conn, machine_id)?.is_none() {
            return Err(EngineError::not_found("Machine", machine_id));
        }
        let session = SessionRepository::find_active_in(&conn, machine_id, operator_id)?.ok_or_else(|| {
            EngineError::NoActiveSession {
                machine_id: machine_id.to_string(),
                operator_id: operator_id.to_string(),
            }
        })?;

        if let Some(matrix_id) = matrix_id {
            match MachineRepository::find_matrix_by_id_in(&conn, matrix_id)? {
                Some(m) if m.machine_id == machine_id => {}
                _ => return Err(EngineError::not_found("Matrix", matrix_id)),
            }
        }

        let log = CycleLog {
            cycle_log_id: uuid::Uuid::new_v4().to_string(),
            session_id: session.session_id,
            machine_id: machine_id.to_string(),
            matrix_id: matrix_id.map(str::to_string),
            operator_id: operator_id.to_string(),
            completed_at: now,
        };
        CycleLogRepository::insert_in(&conn, &log)?;

        debug!(machine_id, cycle_log_id = %log.cycle_log_id, "记录节拍");
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::SessionManager;
    use crate::engine::test_support::fixture;

    #[test]
    fn test_record_cycle_requires_session() {
        let fx = fixture();
        let recorder = CycleRecorder::new(fx.ctx.clone());
        let err = recorder.record_cycle("m0", None, "op1").unwrap_err();
        assert!(matches!(err, EngineError::NoActiveSession { .. }));

        let session = SessionManager::new(fx.ctx.clone()).start_session("m0", "op1").unwrap();
        let log = recorder.record_cycle("m0", None, "op1").unwrap();
        assert_eq!(log.session_id, session.session_id);
    }

    #[test]
    fn test_record_cycle_matrix_must_belong_to_machine() {
        let fx = fixture();
        SessionManager::new(fx.ctx.clone()).start_session("m0", "op1").unwrap();
        SessionManager::new(fx.ctx.clone()).start_session("m2", "op1").unwrap();
        let recorder = CycleRecorder::new(fx.ctx.clone());

        assert!(recorder.record_cycle("m2", Some("m2-mx1"), "op1").is_ok());
        let err = recorder.record_cycle("m0", Some("m2-mx1"), "op1").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let logs = CycleLogRepository::new(fx.ctx.conn.clone())
            .list_by_session(
                &SessionRepository::new(fx.ctx.conn.clone())
                    .find_active_by_machine("m2")
                    .unwrap()
                    .unwrap()
                    .session_id,
            )
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].matrix_id.as_deref(), Some("m2-mx1"));
    }
}
