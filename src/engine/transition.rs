// ==========================================
// 生产台账引擎 - 状态切换引擎
// ==========================================
// 职责: 机台整体 / 单个模具的状态切换，关闭旧区间并打开新区间
// 红线: 关闭-写入-更新状态 在同一机台锁 + 同一事务内完成
// 红线: 同一 (会话, 机台, matrix_id) 切换后恰有一个未关闭区间
// ==========================================
// 机台整体切换: 关闭该会话在机台上的全部未关闭区间（含模具区间）
// 模具切换: 只关闭该模具区间及仍未关闭的整机区间，不改机台状态
// 同状态切换同样切分区间
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::machine::Machine;
use crate::domain::time_log::{OpenTimeLog, TimeLog};
use crate::domain::types::{ActionType, MachineStatus, MatrixStatus};
use crate::engine::context::LedgerContext;
use crate::engine::directory::OperatorDirectory;
use crate::engine::error::{EngineError, EngineResult};
use crate::perf::PerfGuard;
use crate::repository::{
    ActionLogRepository, MachineRepository, SessionRepository, StopReasonRepository,
    TimeLogRepository,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

// ==========================================
// 切换请求 / 结果
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionScope {
    Machine,
    Matrix(i32),
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub machine_id: String,
    pub scope: TransitionScope,
    pub new_status: MachineStatus,
    pub operator_id: String,
    pub stop_reason_id: Option<String>,
}

impl TransitionRequest {
    pub fn machine(machine_id: &str, new_status: MachineStatus, operator_id: &str) -> Self {
        Self {
            machine_id: machine_id.to_string(),
            scope: TransitionScope::Machine,
            new_status,
            operator_id: operator_id.to_string(),
            stop_reason_id: None,
        }
    }

    pub fn matrix(machine_id: &str, matrix_number: i32, new_status: MachineStatus, operator_id: &str) -> Self {
        Self {
            scope: TransitionScope::Matrix(matrix_number),
            ..Self::machine(machine_id, new_status, operator_id)
        }
    }

    pub fn with_reason(mut self, stop_reason_id: &str) -> Self {
        self.stop_reason_id = Some(stop_reason_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub session_id: String,
    pub closed: Vec<TimeLog>,
    pub opened: TimeLog,
}

// ==========================================
// StatusTransitionEngine
// ==========================================
pub struct StatusTransitionEngine {
    ctx: LedgerContext,
}

impl StatusTransitionEngine {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn transition(&self, req: &TransitionRequest) -> EngineResult<TransitionOutcome> {
        let _perf = PerfGuard::new("transition");
        let _machine_lock = self.ctx.locks.acquire(&req.machine_id)?;
        let now = self.ctx.now();

        let mut conn = self.ctx.lock_conn()?;
        let tx = conn.transaction()?;
        let outcome = Self::apply_in(&tx, self.ctx.directory.as_ref(), req, now)?;
        tx.commit()?;

        info!(
            machine_id = %req.machine_id,
            scope = ?req.scope,
            status = %req.new_status,
            operator_id = %req.operator_id,
            session_id = %outcome.session_id,
            closed = outcome.closed.len(),
            "状态切换完成"
        );
        Ok(outcome)
    }

    /// 在调用方事务内执行切换（调用方持有机台锁）
    pub(crate) fn apply_in(
        conn: &Connection,
        directory: &dyn OperatorDirectory,
        req: &TransitionRequest,
        now: NaiveDateTime,
    ) -> EngineResult<TransitionOutcome> {
        let machine = MachineRepository::find_by_id_in(conn, &req.machine_id)?
            .ok_or_else(|| EngineError::not_found("Machine", &req.machine_id))?;

        let session = SessionRepository::find_active_in(conn, &machine.machine_id, &req.operator_id)?
            .ok_or_else(|| EngineError::NoActiveSession {
                machine_id: machine.machine_id.clone(),
                operator_id: req.operator_id.clone(),
            })?;

        if !directory.can_operate(conn, &req.operator_id, &machine)? {
            return Err(EngineError::InvalidTransition(format!(
                "操作员 {} 无权操作机台 {}",
                req.operator_id, machine.code
            )));
        }

        let stop_reason_id = resolve_stop_reason(conn, &machine, req.new_status, req.stop_reason_id.as_deref())?;

        let (to_close, matrix, previous) = match req.scope {
            TransitionScope::Machine => {
                let open = TimeLogRepository::find_open_in(conn, &session.session_id, &machine.machine_id)?;
                (open, None, machine.status.as_str())
            }
            TransitionScope::Matrix(matrix_number) => {
                let matrix_status = MatrixStatus::from_machine_status(req.new_status).ok_or_else(|| {
                    EngineError::InvalidTransition(format!("模具不支持状态 {}", req.new_status))
                })?;
                if !machine.accepts_matrix_number(matrix_number) {
                    return Err(EngineError::not_found(
                        "Matrix",
                        format!("{}#{}", machine.machine_id, matrix_number),
                    ));
                }
                let matrix = MachineRepository::find_matrix_by_number_in(conn, &machine.machine_id, matrix_number)?
                    .ok_or_else(|| {
                        EngineError::not_found("Matrix", format!("{}#{}", machine.machine_id, matrix_number))
                    })?;
                let open = TimeLogRepository::find_open_for_matrix_in(
                    conn,
                    &session.session_id,
                    &machine.machine_id,
                    &matrix.matrix_id,
                )?;
                let previous = matrix.status.as_str();
                (open, Some((matrix, matrix_status)), previous)
            }
        };

        let closed = close_intervals_in(conn, to_close, now)?;

        let opened = TimeLogRepository::insert_open_in(
            conn,
            &OpenTimeLog {
                company_id: machine.company_id.clone(),
                session_id: session.session_id.clone(),
                machine_id: machine.machine_id.clone(),
                matrix_id: matrix.as_ref().map(|(m, _)| m.matrix_id.clone()),
                matrix_number: matrix.as_ref().map(|(m, _)| m.matrix_number),
                operator_id: req.operator_id.clone(),
                status: req.new_status,
                stop_reason_id,
                started_at: now,
            },
        )?;

        let action_type = match &matrix {
            None => {
                MachineRepository::update_status_in(
                    conn,
                    &machine.machine_id,
                    req.new_status,
                    Some(&req.operator_id),
                    now,
                )?;
                ActionType::MachineTransition
            }
            Some((m, status)) => {
                MachineRepository::update_matrix_status_in(conn, &m.matrix_id, *status)?;
                ActionType::MatrixTransition
            }
        };

        ActionLogRepository::insert_in(
            conn,
            &ActionLog::new(
                action_type,
                &req.operator_id,
                now,
                Some(&machine.company_id),
                Some(&machine.machine_id),
                Some(&session.session_id),
            )
            .with_payload(json!({
                "matrix_number": opened.matrix_number,
                "from": previous,
                "to": req.new_status.as_str(),
                "stop_reason_id": opened.stop_reason_id,
                "closed_time_log_ids": closed.iter().map(|l| l.time_log_id.as_str()).collect::<Vec<_>>(),
                "opened_time_log_id": opened.time_log_id,
            })),
        )?;

        Ok(TransitionOutcome {
            session_id: session.session_id,
            closed,
            opened,
        })
    }
}

/// 停机类状态必须带本公司的停机原因；其余状态忽略原因
fn resolve_stop_reason(
    conn: &Connection,
    machine: &Machine,
    status: MachineStatus,
    requested: Option<&str>,
) -> EngineResult<Option<String>> {
    if !status.is_stoppage() {
        return Ok(None);
    }

    let reason_id = requested
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| EngineError::InvalidTransition(format!("状态 {} 需要停机原因", status)))?;

    let reason = StopReasonRepository::find_by_id_in(conn, reason_id)?
        .ok_or_else(|| EngineError::InvalidTransition(format!("停机原因不存在: {}", reason_id)))?;
    if reason.company_id != machine.company_id {
        return Err(EngineError::InvalidTransition(format!(
            "停机原因 {} 不属于机台所在公司",
            reason_id
        )));
    }
    Ok(Some(reason.stop_reason_id))
}

/// 关闭一组区间，返回实际被本次关闭的区间（已关闭的跳过）
pub(crate) fn close_intervals_in(
    conn: &Connection,
    open: Vec<TimeLog>,
    ended_at: NaiveDateTime,
) -> EngineResult<Vec<TimeLog>> {
    let mut closed = Vec::with_capacity(open.len());
    for mut log in open {
        if TimeLogRepository::close_in(conn, &log, ended_at)? {
            log.duration_seconds = Some((ended_at - log.started_at).num_seconds().max(0));
            log.ended_at = Some(ended_at);
            debug!(time_log_id = %log.time_log_id, duration = ?log.duration_seconds, "关闭区间");
            closed.push(log);
        }
    }
    Ok(closed)
}

#[cfg(test)]
mod tests;
