use super::TimeLogRepository;
use crate::db::{open_in_memory_shared, SharedConnection};
use crate::domain::metrics::{ScopeFilter, TimeWindow};
use crate::domain::time_log::OpenTimeLog;
use crate::domain::types::MachineStatus;
use crate::repository::error::RepositoryError;
use chrono::{NaiveDate, NaiveDateTime};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn setup_test_db() -> SharedConnection {
    let conn = open_in_memory_shared().unwrap();
    {
        let c = conn.lock().unwrap();
        c.execute_batch(
            r#"
            INSERT INTO machine (machine_id, company_id, group_id, code, matrix_count)
              VALUES ('m1', 'c1', 'g1', 'M-01', 2),
                     ('m2', 'c1', 'g2', 'M-02', 0);
            INSERT INTO matrix (matrix_id, machine_id, matrix_number) VALUES
              ('mx1', 'm1', 1), ('mx2', 'm1', 2);
            INSERT INTO production_session (session_id, company_id, machine_id, operator_id, started_at)
              VALUES ('s1', 'c1', 'm1', 'op1', '2026-03-02 08:00:00'),
                     ('s2', 'c1', 'm2', 'op2', '2026-03-02 08:00:00');
            "#,
        )
        .unwrap();
    }
    conn
}

fn open(session: &str, machine: &str, matrix: Option<(&str, i32)>, status: MachineStatus, start: NaiveDateTime) -> OpenTimeLog {
    OpenTimeLog {
        company_id: "c1".to_string(),
        session_id: session.to_string(),
        machine_id: machine.to_string(),
        matrix_id: matrix.map(|(id, _)| id.to_string()),
        matrix_number: matrix.map(|(_, n)| n),
        operator_id: "op1".to_string(),
        status,
        stop_reason_id: None,
        started_at: start,
    }
}

#[test]
fn test_close_sets_duration_once_and_is_idempotent() {
    let conn = setup_test_db();
    let repo = TimeLogRepository::new(conn.clone());

    let log = {
        let c = conn.lock().unwrap();
        TimeLogRepository::insert_open_in(&c, &open("s1", "m1", None, MachineStatus::Running, at(8, 0)))
            .unwrap()
    };

    {
        let c = conn.lock().unwrap();
        assert!(TimeLogRepository::close_in(&c, &log, at(8, 2)).unwrap());
        // 重复关闭不报错，也不改写
        assert!(!TimeLogRepository::close_in(&c, &log, at(9, 0)).unwrap());
    }

    let stored = repo.find_by_id(&log.time_log_id).unwrap().unwrap();
    assert_eq!(stored.ended_at, Some(at(8, 2)));
    assert_eq!(stored.duration_seconds, Some(120));
}

#[test]
fn test_second_open_interval_on_same_key_is_rejected() {
    let conn = setup_test_db();
    let c = conn.lock().unwrap();

    TimeLogRepository::insert_open_in(&c, &open("s1", "m1", Some(("mx1", 1)), MachineStatus::Running, at(8, 0)))
        .unwrap();
    let err = TimeLogRepository::insert_open_in(
        &c,
        &open("s1", "m1", Some(("mx1", 1)), MachineStatus::Stopped, at(8, 1)),
    )
    .unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    assert!(err.is_concurrent_write_conflict());

    // 不同模具互不影响
    TimeLogRepository::insert_open_in(&c, &open("s1", "m1", Some(("mx2", 2)), MachineStatus::Running, at(8, 1)))
        .unwrap();
}

#[test]
fn test_stop_reason_dropped_for_non_stop_status() {
    let conn = setup_test_db();
    let c = conn.lock().unwrap();
    c.execute(
        "INSERT INTO stop_reason (stop_reason_id, company_id, name, category) VALUES ('r1', 'c1', '缺料', 'MATERIAL')",
        [],
    )
    .unwrap();

    let mut req = open("s1", "m1", None, MachineStatus::Running, at(8, 0));
    req.stop_reason_id = Some("r1".to_string());
    let log = TimeLogRepository::insert_open_in(&c, &req).unwrap();
    assert_eq!(log.stop_reason_id, None);
}

#[test]
fn test_find_open_for_matrix_includes_machine_wide_row_only() {
    let conn = setup_test_db();
    let c = conn.lock().unwrap();

    TimeLogRepository::insert_open_in(&c, &open("s1", "m1", None, MachineStatus::Running, at(8, 0))).unwrap();
    TimeLogRepository::insert_open_in(&c, &open("s1", "m1", Some(("mx1", 1)), MachineStatus::Running, at(8, 0)))
        .unwrap();
    TimeLogRepository::insert_open_in(&c, &open("s1", "m1", Some(("mx2", 2)), MachineStatus::Running, at(8, 0)))
        .unwrap();

    let rows = TimeLogRepository::find_open_for_matrix_in(&c, "s1", "m1", "mx1").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.matrix_id.is_none()));
    assert!(rows.iter().all(|r| r.matrix_id.as_deref() != Some("mx2")));

    assert_eq!(TimeLogRepository::find_open_in(&c, "s1", "m1").unwrap().len(), 3);
}

#[test]
fn test_find_abandoned_uses_start_cutoff() {
    let conn = setup_test_db();
    let repo = TimeLogRepository::new(conn.clone());
    {
        let c = conn.lock().unwrap();
        TimeLogRepository::insert_open_in(&c, &open("s1", "m1", None, MachineStatus::Running, at(1, 0))).unwrap();
        TimeLogRepository::insert_open_in(&c, &open("s2", "m2", None, MachineStatus::Running, at(10, 0))).unwrap();
    }

    let stale = repo.find_abandoned(at(5, 0)).unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].machine_id, "m1");
}

#[test]
fn test_list_overlapping_applies_window_and_scope() {
    let conn = setup_test_db();
    let repo = TimeLogRepository::new(conn.clone());
    {
        let c = conn.lock().unwrap();
        let early = TimeLogRepository::insert_open_in(&c, &open("s1", "m1", None, MachineStatus::Running, at(6, 0)))
            .unwrap();
        TimeLogRepository::close_in(&c, &early, at(7, 0)).unwrap();
        TimeLogRepository::insert_open_in(&c, &open("s1", "m1", None, MachineStatus::Stopped, at(7, 0))).unwrap();
        TimeLogRepository::insert_open_in(&c, &open("s2", "m2", None, MachineStatus::Running, at(8, 0))).unwrap();
    }

    let window = TimeWindow::new(at(7, 30), at(12, 0));
    let all = repo.list_overlapping(&ScopeFilter::default(), &window).unwrap();
    assert_eq!(all.len(), 2);

    let g1 = ScopeFilter {
        group_ids: vec!["g1".to_string()],
        ..Default::default()
    };
    let only_m1 = repo.list_overlapping(&g1, &window).unwrap();
    assert_eq!(only_m1.len(), 1);
    assert_eq!(only_m1[0].status, MachineStatus::Stopped);
}
