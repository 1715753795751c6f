// ==========================================
// 生产台账引擎 - 生产台账 API
// ==========================================
// 职责: 开班/收班、状态切换、节拍记录、工时查询、遗留区间回收
// 入参校验在本层完成，业务规则交给引擎
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::metrics::{ActiveTime, TimeWindow};
use crate::domain::session::ProductionSession;
use crate::domain::time_log::{CycleLog, TimeLog};
use crate::domain::types::MachineStatus;
use crate::engine::batch::BatchReport;
use crate::engine::clock::DayBoundary;
use crate::engine::context::LedgerContext;
use crate::engine::cycle::CycleRecorder;
use crate::engine::metrics::MetricsAggregator;
use crate::engine::recovery::RecoverySweep;
use crate::engine::session::{SessionClosure, SessionManager};
use crate::engine::transition::{StatusTransitionEngine, TransitionOutcome, TransitionRequest};
use crate::repository::{SessionRepository, TimeLogRepository};

// ==========================================
// ShiftStart - 操作员当日首次开班
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftStart {
    pub operator_id: String,
    pub day: NaiveDate,
    pub window: TimeWindow,
    pub first_started_at: Option<NaiveDateTime>, // 当日无会话为 None
}

// ==========================================
// ProductionApi - 生产台账 API
// ==========================================

/// 生产台账API
///
/// 职责：
/// 1. 开班 / 收班
/// 2. 机台整体与单个模具的状态切换
/// 3. 节拍记录
/// 4. 工时与班次查询
/// 5. 遗留区间回收（管理操作）
pub struct ProductionApi {
    ctx: LedgerContext,
    day_boundary: DayBoundary,
    default_sweep_threshold: Duration,
    sessions: SessionManager,
    transitions: StatusTransitionEngine,
    cycles: CycleRecorder,
    recovery: RecoverySweep,
    metrics: MetricsAggregator,
}

impl ProductionApi {
    /// 创建新的ProductionApi实例
    ///
    /// # 参数
    /// - ctx: 引擎共享依赖
    /// - day_boundary: 业务日界（GetShiftStart 使用）
    /// - default_sweep_threshold: 回收未指定阈值时使用的默认值
    pub fn new(ctx: LedgerContext, day_boundary: DayBoundary, default_sweep_threshold: Duration) -> Self {
        Self {
            sessions: SessionManager::new(ctx.clone()),
            transitions: StatusTransitionEngine::new(ctx.clone()),
            cycles: CycleRecorder::new(ctx.clone()),
            recovery: RecoverySweep::new(ctx.clone()),
            metrics: MetricsAggregator::new(ctx.clone()),
            ctx,
            day_boundary,
            default_sweep_threshold,
        }
    }

    // ==========================================
    // 会话
    // ==========================================

    pub fn start_session(&self, machine_id: &str, operator_id: &str) -> ApiResult<ProductionSession> {
        let machine_id = require_id("machine_id", machine_id)?;
        let operator_id = require_id("operator_id", operator_id)?;
        Ok(self.sessions.start_session(machine_id, operator_id)?)
    }

    pub fn end_session(&self, machine_id: &str, operator_id: &str) -> ApiResult<SessionClosure> {
        let machine_id = require_id("machine_id", machine_id)?;
        let operator_id = require_id("operator_id", operator_id)?;
        Ok(self.sessions.end_session(machine_id, operator_id)?)
    }

    // ==========================================
    // 状态切换
    // ==========================================

    /// 机台整体状态切换
    ///
    /// # 参数
    /// - new_status: IDLE / RUNNING / STOPPED / EMERGENCY（大小写不敏感）
    /// - stop_reason_id: 停机类状态必填，其余状态忽略
    pub fn transition_machine(
        &self,
        machine_id: &str,
        new_status: &str,
        operator_id: &str,
        stop_reason_id: Option<&str>,
    ) -> ApiResult<TransitionOutcome> {
        let machine_id = require_id("machine_id", machine_id)?;
        let operator_id = require_id("operator_id", operator_id)?;
        let status = parse_status(new_status)?;

        let mut req = TransitionRequest::machine(machine_id, status, operator_id);
        req.stop_reason_id = stop_reason_id.map(str::to_string);
        Ok(self.transitions.transition(&req)?)
    }

    /// 单个模具状态切换（仅 RUNNING / STOPPED）
    pub fn transition_matrix(
        &self,
        machine_id: &str,
        matrix_number: i32,
        new_status: &str,
        operator_id: &str,
        stop_reason_id: Option<&str>,
    ) -> ApiResult<TransitionOutcome> {
        let machine_id = require_id("machine_id", machine_id)?;
        let operator_id = require_id("operator_id", operator_id)?;
        if matrix_number < 1 {
            return Err(ApiError::InvalidInput(format!("模具序号必须从1开始: {}", matrix_number)));
        }
        let status = parse_status(new_status)?;

        let mut req = TransitionRequest::matrix(machine_id, matrix_number, status, operator_id);
        req.stop_reason_id = stop_reason_id.map(str::to_string);
        Ok(self.transitions.transition(&req)?)
    }

    // ==========================================
    // 节拍
    // ==========================================

    pub fn record_cycle(&self, machine_id: &str, matrix_id: Option<&str>, operator_id: &str) -> ApiResult<CycleLog> {
        let machine_id = require_id("machine_id", machine_id)?;
        let operator_id = require_id("operator_id", operator_id)?;
        let matrix_id = match matrix_id {
            Some(id) => Some(require_id("matrix_id", id)?),
            None => None,
        };
        Ok(self.cycles.record_cycle(machine_id, matrix_id, operator_id)?)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_active_time(&self, machine_id: &str, window: &TimeWindow) -> ApiResult<ActiveTime> {
        let machine_id = require_id("machine_id", machine_id)?;
        validate_window(window)?;
        Ok(self.metrics.active_time(machine_id, window)?)
    }

    /// 操作员在业务日 day 内的首次开班时间
    pub fn get_shift_start(&self, operator_id: &str, day: NaiveDate) -> ApiResult<ShiftStart> {
        let operator_id = require_id("operator_id", operator_id)?;
        let window = self
            .day_boundary
            .day_window(day)
            .ok_or_else(|| ApiError::InvalidInput(format!("业务日超出可表示范围: {}", day)))?;
        let first_started_at = SessionRepository::new(self.ctx.conn.clone()).find_first_start_by_operator(
            operator_id,
            window.start,
            window.end,
        )?;

        Ok(ShiftStart {
            operator_id: operator_id.to_string(),
            day,
            window,
            first_started_at,
        })
    }

    pub fn get_active_session(&self, machine_id: &str) -> ApiResult<Option<ProductionSession>> {
        let machine_id = require_id("machine_id", machine_id)?;
        Ok(SessionRepository::new(self.ctx.conn.clone()).find_active_by_machine(machine_id)?)
    }

    pub fn list_open_time_logs(&self, machine_id: &str) -> ApiResult<Vec<TimeLog>> {
        let machine_id = require_id("machine_id", machine_id)?;
        Ok(TimeLogRepository::new(self.ctx.conn.clone()).list_open_by_machine(machine_id)?)
    }

    pub fn list_session_time_logs(&self, session_id: &str) -> ApiResult<Vec<TimeLog>> {
        let session_id = require_id("session_id", session_id)?;
        let repo = SessionRepository::new(self.ctx.conn.clone());
        if repo.find_by_id(session_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Session(id={})", session_id)));
        }
        Ok(TimeLogRepository::new(self.ctx.conn.clone()).list_by_session(session_id)?)
    }

    // ==========================================
    // 维护
    // ==========================================

    /// 回收遗留区间
    ///
    /// # 参数
    /// - older_than_hours: None 时使用配置的默认阈值
    pub fn run_maintenance_sweep(&self, older_than_hours: Option<i64>) -> ApiResult<BatchReport> {
        let threshold = match older_than_hours {
            Some(h) if h <= 0 => {
                return Err(ApiError::InvalidInput(format!("回收阈值必须为正: {}h", h)));
            }
            Some(h) => Duration::try_hours(h)
                .ok_or_else(|| ApiError::InvalidInput(format!("回收阈值超出范围: {}h", h)))?,
            None => self.default_sweep_threshold,
        };
        Ok(self.recovery.close_abandoned(threshold)?)
    }
}

// ==========================================
// 入参校验
// ==========================================

pub(crate) fn require_id<'a>(field: &str, value: &'a str) -> ApiResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(trimmed)
}

pub(crate) fn validate_window(window: &TimeWindow) -> ApiResult<()> {
    if !window.is_valid() {
        return Err(ApiError::InvalidInput(format!(
            "时间窗口无效: start={} end={}",
            window.start, window.end
        )));
    }
    Ok(())
}

/// 状态不在枚举内属于无效切换
fn parse_status(raw: &str) -> ApiResult<MachineStatus> {
    MachineStatus::parse(raw).ok_or_else(|| ApiError::InvalidTransition(format!("未知状态: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id_trims_and_rejects_blank() {
        assert_eq!(require_id("machine_id", "  m1 ").unwrap(), "m1");
        assert!(matches!(require_id("machine_id", "   "), Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("stopped").unwrap(), MachineStatus::Stopped);
        assert!(matches!(parse_status("PAUSED"), Err(ApiError::InvalidTransition(_))));
    }

    #[test]
    fn test_validate_window_rejects_inverted() {
        let t = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(8, 0, 0).unwrap();
        assert!(validate_window(&TimeWindow::new(t, t + Duration::hours(1))).is_ok());
        assert!(matches!(
            validate_window(&TimeWindow::new(t, t)),
            Err(ApiError::InvalidInput(_))
        ));
    }
}
