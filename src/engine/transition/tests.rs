use super::*;
use crate::engine::directory::GroupMembershipDirectory;
use crate::engine::session::SessionManager;
use crate::engine::test_support::{fixture, t0, Fixture, REASON_MATERIAL, REASON_MOLD, REASON_OTHER_COMPANY};
use crate::repository::OperatorGroupRepository;
use std::sync::Arc;
use std::thread;

fn engines(fx: &Fixture) -> (SessionManager, StatusTransitionEngine) {
    (
        SessionManager::new(fx.ctx.clone()),
        StatusTransitionEngine::new(fx.ctx.clone()),
    )
}

// ==========================================
// 典型场景
// ==========================================

#[test]
fn test_machine_stop_and_resume_durations() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    let session = sessions.start_session("m0", "op1").unwrap();

    fx.advance(120);
    let stop = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Stopped, "op1").with_reason(REASON_MATERIAL))
        .unwrap();
    assert_eq!(stop.closed.len(), 1);
    assert_eq!(stop.closed[0].duration_seconds, Some(120));
    assert_eq!(stop.opened.stop_reason_id.as_deref(), Some(REASON_MATERIAL));

    fx.advance(30);
    engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Running, "op1"))
        .unwrap();

    fx.advance(600);
    sessions.end_session("m0", "op1").unwrap();

    let logs = fx.session_logs(&session.session_id);
    let durations: Vec<i64> = logs.iter().map(|l| l.duration_seconds.unwrap()).collect();
    assert_eq!(durations, vec![120, 30, 600]);
    assert_eq!(durations.iter().sum::<i64>(), 750);
    assert!(logs.iter().all(|l| !l.is_open()));
}

#[test]
fn test_matrix_chains_are_independent() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    let session = sessions.start_session("m2", "op1").unwrap();

    fx.advance(60);
    let first = engine
        .transition(&TransitionRequest::matrix("m2", 1, MachineStatus::Stopped, "op1").with_reason(REASON_MATERIAL))
        .unwrap();
    // 首次单独操作模具时整机区间被替代
    assert_eq!(first.closed.len(), 1);
    assert!(first.closed[0].is_machine_wide());
    assert_eq!(first.opened.matrix_number, Some(1));

    fx.advance(60);
    let second = engine
        .transition(&TransitionRequest::matrix("m2", 2, MachineStatus::Stopped, "op1").with_reason(REASON_MOLD))
        .unwrap();
    assert!(second.closed.is_empty());

    let open = fx.open_logs("m2");
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|l| !l.is_machine_wide()));

    // 模具切换不改机台整体状态
    assert_eq!(fx.machine("m2").status, MachineStatus::Running);

    fx.advance(60);
    let closure = sessions.end_session("m2", "op1").unwrap();
    assert_eq!(closure.closed_time_logs, 2);
    assert!(fx.open_logs("m2").is_empty());
    assert_eq!(fx.session_logs(&session.session_id).len(), 3);
}

#[test]
fn test_matrix_transition_updates_matrix_status() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    sessions.start_session("m2", "op1").unwrap();

    engine
        .transition(&TransitionRequest::matrix("m2", 2, MachineStatus::Stopped, "op1").with_reason(REASON_MOLD))
        .unwrap();

    let matrices = MachineRepository::new(fx.ctx.conn.clone()).list_matrices("m2").unwrap();
    assert_eq!(matrices[0].status, MatrixStatus::Running);
    assert_eq!(matrices[1].status, MatrixStatus::Stopped);

    sessions.end_session("m2", "op1").unwrap();
    let matrices = MachineRepository::new(fx.ctx.conn.clone()).list_matrices("m2").unwrap();
    assert!(matrices.iter().all(|m| m.status == MatrixStatus::Running));
}

#[test]
fn test_machine_transition_closes_matrix_rows_too() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    sessions.start_session("m2", "op1").unwrap();

    fx.advance(10);
    engine
        .transition(&TransitionRequest::matrix("m2", 1, MachineStatus::Stopped, "op1").with_reason(REASON_MOLD))
        .unwrap();
    fx.advance(10);
    engine
        .transition(&TransitionRequest::matrix("m2", 2, MachineStatus::Running, "op1"))
        .unwrap();

    fx.advance(10);
    let out = engine
        .transition(&TransitionRequest::machine("m2", MachineStatus::Emergency, "op1").with_reason(REASON_MOLD))
        .unwrap();
    assert_eq!(out.closed.len(), 2);

    let open = fx.open_logs("m2");
    assert_eq!(open.len(), 1);
    assert!(open[0].is_machine_wide());
    assert_eq!(fx.machine("m2").status, MachineStatus::Emergency);
}

#[test]
fn test_same_status_still_splits_interval() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    let session = sessions.start_session("m0", "op1").unwrap();

    fx.advance(100);
    engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Running, "op1"))
        .unwrap();
    fx.advance(50);
    engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Running, "op1"))
        .unwrap();
    fx.advance(25);
    sessions.end_session("m0", "op1").unwrap();

    let logs = fx.session_logs(&session.session_id);
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.status == MachineStatus::Running));
    assert_eq!(logs.iter().filter_map(|l| l.duration_seconds).sum::<i64>(), 175);
}

#[test]
fn test_machine_wide_intervals_cover_session_without_gaps() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    let session = sessions.start_session("m0", "op1").unwrap();

    let steps = [
        (45, MachineStatus::Stopped, Some(REASON_MATERIAL)),
        (15, MachineStatus::Running, None),
        (5, MachineStatus::Emergency, Some(REASON_MOLD)),
        (90, MachineStatus::Idle, None),
        (30, MachineStatus::Running, None),
    ];
    for (secs, status, reason) in steps {
        fx.advance(secs);
        let mut req = TransitionRequest::machine("m0", status, "op1");
        req.stop_reason_id = reason.map(str::to_string);
        engine.transition(&req).unwrap();
    }
    fx.advance(20);
    let closure = sessions.end_session("m0", "op1").unwrap();

    let logs = fx.session_logs(&session.session_id);
    assert_eq!(logs.first().unwrap().started_at, t0());
    assert_eq!(logs.last().unwrap().ended_at, Some(closure.ended_at));
    for pair in logs.windows(2) {
        assert_eq!(pair[0].ended_at, Some(pair[1].started_at));
    }
    let total: i64 = logs.iter().filter_map(|l| l.duration_seconds).sum();
    assert_eq!(total, (closure.ended_at - t0()).num_seconds());
}

// ==========================================
// 前置条件与校验
// ==========================================

#[test]
fn test_transition_without_session() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);

    let err = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Running, "op1"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NoActiveSession { .. }));

    // 会话属于其他操作员
    sessions.start_session("m0", "op1").unwrap();
    let err = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Running, "op2"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NoActiveSession { .. }));
}

#[test]
fn test_unknown_machine_and_matrix() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    sessions.start_session("m0", "op1").unwrap();
    sessions.start_session("m2", "op1").unwrap();

    let err = engine
        .transition(&TransitionRequest::machine("ghost", MachineStatus::Running, "op1"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine
        .transition(&TransitionRequest::matrix("m2", 3, MachineStatus::Running, "op1"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine
        .transition(&TransitionRequest::matrix("m0", 1, MachineStatus::Running, "op1"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn test_stop_reason_rules() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    sessions.start_session("m0", "op1").unwrap();

    let missing = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Stopped, "op1"))
        .unwrap_err();
    assert!(matches!(missing, EngineError::InvalidTransition(_)));

    let unknown = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Stopped, "op1").with_reason("nope"))
        .unwrap_err();
    assert!(matches!(unknown, EngineError::InvalidTransition(_)));

    let foreign = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Emergency, "op1").with_reason(REASON_OTHER_COMPANY))
        .unwrap_err();
    assert!(matches!(foreign, EngineError::InvalidTransition(_)));

    // 非停机状态忽略原因
    let running = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Running, "op1").with_reason(REASON_MATERIAL))
        .unwrap();
    assert_eq!(running.opened.stop_reason_id, None);

    // 校验失败不影响台账
    assert_eq!(fx.open_logs("m0").len(), 1);
}

#[test]
fn test_matrix_rejects_machine_only_statuses() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    sessions.start_session("m2", "op1").unwrap();

    for status in [MachineStatus::Idle, MachineStatus::Emergency] {
        let err = engine
            .transition(&TransitionRequest::matrix("m2", 1, status, "op1").with_reason(REASON_MOLD))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
    }
}

#[test]
fn test_group_membership_is_enforced() {
    let fx = fixture();
    let mut ctx = fx.ctx.clone();
    ctx.directory = Arc::new(GroupMembershipDirectory);
    let sessions = SessionManager::new(ctx);

    let err = sessions.start_session("m2", "op1").unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    OperatorGroupRepository::new(fx.ctx.conn.clone()).add_member("op1", "g1").unwrap();
    assert!(sessions.start_session("m2", "op1").is_ok());
}

// ==========================================
// 原子性与并发
// ==========================================

#[test]
fn test_failed_status_update_rolls_back_interval_split() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    sessions.start_session("m0", "op1").unwrap();
    let before = fx.open_logs("m0");

    fx.ctx
        .conn
        .lock()
        .unwrap()
        .execute_batch(
            r#"
            CREATE TRIGGER fail_machine_update BEFORE UPDATE ON machine
            BEGIN
                SELECT RAISE(ABORT, 'machine row locked by maintenance');
            END;
            "#,
        )
        .unwrap();

    fx.advance(30);
    let err = engine
        .transition(&TransitionRequest::machine("m0", MachineStatus::Stopped, "op1").with_reason(REASON_MATERIAL))
        .unwrap_err();
    assert!(matches!(err, EngineError::PersistenceFailure(_)));

    let after = fx.open_logs("m0");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].time_log_id, before[0].time_log_id);
    assert!(after[0].is_open());
    assert_eq!(fx.machine("m0").status, MachineStatus::Running);
}

#[test]
fn test_concurrent_transitions_leave_one_open_interval() {
    let fx = fixture();
    let (sessions, engine) = engines(&fx);
    let session = sessions.start_session("m0", "op1").unwrap();
    let engine = Arc::new(engine);

    let handles: Vec<_> = [
        TransitionRequest::machine("m0", MachineStatus::Stopped, "op1").with_reason(REASON_MATERIAL),
        TransitionRequest::machine("m0", MachineStatus::Running, "op1"),
    ]
    .into_iter()
    .map(|req| {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.transition(&req).is_ok())
    })
    .collect();

    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    let open = fx.open_logs("m0");
    assert_eq!(open.len(), 1);
    assert_eq!(fx.session_logs(&session.session_id).len(), 1 + succeeded);
}
