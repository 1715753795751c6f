// 引擎单元测试公共夹具: 内存库 + 手动时钟 + 预置机台/停机原因

use crate::db::open_in_memory_shared;
use crate::domain::machine::{Machine, Matrix};
use crate::domain::time_log::TimeLog;
use crate::domain::types::{MachineStatus, MatrixStatus};
use crate::engine::clock::ManualClock;
use crate::engine::context::LedgerContext;
use crate::engine::directory::AllowAllDirectory;
use crate::engine::machine_lock::MachineLockManager;
use crate::repository::{MachineRepository, StopReasonRepository, TimeLogRepository};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const REASON_MATERIAL: &str = "r-material";
pub(crate) const REASON_MOLD: &str = "r-mold";
pub(crate) const REASON_OTHER_COMPANY: &str = "r-other";

pub(crate) fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

pub(crate) struct Fixture {
    pub ctx: LedgerContext,
    pub clock: Arc<ManualClock>,
    pub shift_ended_reason_id: String,
}

impl Fixture {
    pub fn advance(&self, secs: i64) {
        self.clock.advance_secs(secs);
    }

    pub fn open_logs(&self, machine_id: &str) -> Vec<TimeLog> {
        TimeLogRepository::new(self.ctx.conn.clone())
            .list_open_by_machine(machine_id)
            .unwrap()
    }

    pub fn session_logs(&self, session_id: &str) -> Vec<TimeLog> {
        TimeLogRepository::new(self.ctx.conn.clone())
            .list_by_session(session_id)
            .unwrap()
    }

    pub fn machine(&self, machine_id: &str) -> Machine {
        MachineRepository::new(self.ctx.conn.clone())
            .find_by_id(machine_id)
            .unwrap()
            .unwrap()
    }
}

fn machine(id: &str, group: Option<&str>, matrix_count: i32, nominal: f64) -> Machine {
    Machine {
        machine_id: id.to_string(),
        company_id: "c1".to_string(),
        group_id: group.map(str::to_string),
        code: id.to_uppercase(),
        matrix_count,
        nominal_cycle_seconds: nominal,
        status: MachineStatus::Idle,
        current_operator_id: None,
    }
}

/// m0: 无模具；m2: 2 个模具 (g1)
pub(crate) fn fixture() -> Fixture {
    crate::logging::init_test();
    let conn = open_in_memory_shared().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));

    {
        let c = conn.lock().unwrap();
        MachineRepository::insert_in(&c, &machine("m0", None, 0, 60.0), t0()).unwrap();
        MachineRepository::insert_in(&c, &machine("m2", Some("g1"), 2, 30.0), t0()).unwrap();
        for n in 1..=2 {
            MachineRepository::insert_matrix_in(
                &c,
                &Matrix {
                    matrix_id: format!("m2-mx{}", n),
                    machine_id: "m2".to_string(),
                    matrix_number: n,
                    status: MatrixStatus::Running,
                },
            )
            .unwrap();
        }
        c.execute_batch(&format!(
            r#"
            INSERT INTO stop_reason (stop_reason_id, company_id, name, category)
              VALUES ('{}', 'c1', '缺料', 'MATERIAL'),
                     ('{}', 'c1', '模具故障', 'TOOLING'),
                     ('{}', 'c2', '缺料', 'MATERIAL');
            "#,
            REASON_MATERIAL, REASON_MOLD, REASON_OTHER_COMPANY
        ))
        .unwrap();
    }

    let shift_ended = StopReasonRepository::new(conn.clone())
        .ensure_shift_ended_reason("c1")
        .unwrap();

    let ctx = LedgerContext::new(
        conn,
        clock.clone(),
        Arc::new(MachineLockManager::new(Duration::from_millis(500))),
        Arc::new(AllowAllDirectory),
    );

    Fixture {
        ctx,
        clock,
        shift_ended_reason_id: shift_ended.stop_reason_id,
    }
}
