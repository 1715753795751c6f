use super::ActionLogRepository;
use crate::db::open_in_memory_shared;
use crate::domain::action_log::{ActionLog, SYSTEM_ACTOR};
use crate::domain::types::ActionType;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[test]
fn test_insert_and_find_by_id_roundtrips_payload() {
    let repo = ActionLogRepository::new(open_in_memory_shared().unwrap());

    let log = ActionLog::new(ActionType::MachineTransition, "op1", at(8, 0), Some("c1"), Some("m1"), Some("s1"))
        .with_payload(json!({ "from": "RUNNING", "to": "STOPPED" }))
        .with_detail("切换为停机");
    let id = repo.insert(&log).unwrap();

    let stored = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(stored.action_type, "MACHINE_TRANSITION");
    assert_eq!(stored.action_ts, at(8, 0));
    assert_eq!(stored.payload_json.unwrap()["to"], "STOPPED");
    assert_eq!(stored.detail.as_deref(), Some("切换为停机"));
}

#[test]
fn test_find_by_machine_newest_first_with_limit() {
    let repo = ActionLogRepository::new(open_in_memory_shared().unwrap());
    for minute in 0..5 {
        let log = ActionLog::new(ActionType::MachineTransition, "op1", at(8, minute), Some("c1"), Some("m1"), Some("s1"));
        repo.insert(&log).unwrap();
    }
    repo.insert(&ActionLog::new(ActionType::AutoClose, SYSTEM_ACTOR, at(9, 0), Some("c1"), Some("m2"), None))
        .unwrap();

    let logs = repo.find_by_machine("m1", 3).unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].action_ts, at(8, 4));
    assert!(logs.iter().all(|l| l.machine_id.as_deref() == Some("m1")));
}

#[test]
fn test_find_by_session_and_time_range() {
    let repo = ActionLogRepository::new(open_in_memory_shared().unwrap());
    repo.insert(&ActionLog::new(ActionType::SessionStart, "op1", at(8, 0), Some("c1"), Some("m1"), Some("s1")))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::SessionEnd, "op1", at(16, 0), Some("c1"), Some("m1"), Some("s1")))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::SessionStart, "op2", at(16, 5), Some("c1"), Some("m1"), Some("s2")))
        .unwrap();

    let s1 = repo.find_by_session("s1").unwrap();
    assert_eq!(s1.len(), 2);
    assert_eq!(s1[0].action_type, "SESSION_START");

    let morning = repo.find_by_time_range(at(7, 0), at(12, 0)).unwrap();
    assert_eq!(morning.len(), 1);
    assert_eq!(repo.count_by_type("SESSION_START").unwrap(), 2);
}
