// ==========================================
// 生产台账引擎 - 机台/模具登记
// ==========================================
// 机台登记时按 matrix_count 生成模具 1..N
// 调整模具数量: 按序号补齐 / 删除多余模具；有进行中会话时拒绝
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::machine::{Machine, Matrix, NewMachine};
use crate::domain::types::{ActionType, MachineStatus, MatrixStatus};
use crate::engine::context::LedgerContext;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{ActionLogRepository, MachineRepository, SessionRepository};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

pub struct ResourceRegistry {
    ctx: LedgerContext,
}

impl ResourceRegistry {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn register_machine(&self, new_machine: &NewMachine) -> EngineResult<Machine> {
        if new_machine.matrix_count < 0 {
            return Err(EngineError::InvalidTransition(format!(
                "模具数量不能为负: {}",
                new_machine.matrix_count
            )));
        }

        let now = self.ctx.now();
        let machine = Machine {
            machine_id: uuid::Uuid::new_v4().to_string(),
            company_id: new_machine.company_id.clone(),
            group_id: new_machine.group_id.clone(),
            code: new_machine.code.clone(),
            matrix_count: new_machine.matrix_count,
            nominal_cycle_seconds: new_machine.nominal_cycle_seconds,
            status: MachineStatus::Idle,
            current_operator_id: None,
        };

        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;
        MachineRepository::insert_in(&tx, &machine, now)?;
        insert_matrices_in(&tx, &machine.machine_id, 1, machine.matrix_count)?;
        tx.commit()?;

        info!(
            machine_id = %machine.machine_id,
            code = %machine.code,
            matrix_count = machine.matrix_count,
            "机台登记"
        );
        Ok(machine)
    }

    /// 调整模具数量，返回调整后的模具列表
    pub fn set_matrix_count(&self, machine_id: &str, matrix_count: i32, actor: &str) -> EngineResult<Vec<Matrix>> {
        if matrix_count < 0 {
            return Err(EngineError::InvalidTransition(format!("模具数量不能为负: {}", matrix_count)));
        }

        let _machine_lock = self.ctx.locks.acquire(machine_id)?;
        let now = self.ctx.now();
        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;

        let machine = MachineRepository::find_by_id_in(&tx, machine_id)?
            .ok_or_else(|| EngineError::not_found("Machine", machine_id))?;

        if let Some(active) = SessionRepository::find_active_by_machine_in(&tx, machine_id)? {
            return Err(EngineError::AlreadyActive {
                machine_id: machine_id.to_string(),
                owner_operator_id: active.operator_id,
            });
        }

        let existing = MachineRepository::list_matrices_in(&tx, machine_id)?;
        let highest = existing.iter().map(|m| m.matrix_number).max().unwrap_or(0);
        let created = insert_matrices_in(&tx, machine_id, highest + 1, matrix_count)?;
        let removed = MachineRepository::delete_matrices_above_in(&tx, machine_id, matrix_count)?;
        MachineRepository::update_matrix_count_in(&tx, machine_id, matrix_count, now)?;

        ActionLogRepository::insert_in(
            &tx,
            &ActionLog::new(
                ActionType::MatrixReconcile,
                actor,
                now,
                Some(&machine.company_id),
                Some(machine_id),
                None,
            )
            .with_payload(json!({
                "from": machine.matrix_count,
                "to": matrix_count,
                "created": created,
                "removed": removed,
            })),
        )?;

        let matrices = MachineRepository::list_matrices_in(&tx, machine_id)?;
        tx.commit()?;

        info!(machine_id, from = machine.matrix_count, to = matrix_count, created, removed, "模具数量调整");
        Ok(matrices)
    }

    pub fn get_machine(&self, machine_id: &str) -> EngineResult<Machine> {
        MachineRepository::new(self.ctx.conn.clone())
            .find_by_id(machine_id)?
            .ok_or_else(|| EngineError::not_found("Machine", machine_id))
    }

    pub fn list_matrices(&self, machine_id: &str) -> EngineResult<Vec<Matrix>> {
        self.get_machine(machine_id)?;
        Ok(MachineRepository::new(self.ctx.conn.clone()).list_matrices(machine_id)?)
    }
}

/// 生成序号 from..=to 的模具（初始 RUNNING）
fn insert_matrices_in(conn: &Connection, machine_id: &str, from: i32, to: i32) -> EngineResult<usize> {
    let mut created = 0;
    for matrix_number in from..=to {
        MachineRepository::insert_matrix_in(
            conn,
            &Matrix {
                matrix_id: uuid::Uuid::new_v4().to_string(),
                machine_id: machine_id.to_string(),
                matrix_number,
                status: MatrixStatus::Running,
            },
        )?;
        created += 1;
    }
    Ok(created)
}
