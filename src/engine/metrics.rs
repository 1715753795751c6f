// ==========================================
// 生产台账引擎 - 统计聚合
// ==========================================
// 只读；与台账写入并发执行，不取机台锁
// 区间贡献按窗口裁剪；未关闭区间按 now 计算
// 无数据返回零值，不报错
// ==========================================

use crate::domain::metrics::{
    percentage, ActiveTime, CycleMetrics, ParetoEntry, ScopeFilter, StatusDuration, TimeMetrics,
    TimeWindow,
};
use crate::domain::time_log::TimeLog;
use crate::domain::types::MachineStatus;
use crate::engine::context::LedgerContext;
use crate::engine::error::{EngineError, EngineResult};
use crate::perf::PerfGuard;
use crate::repository::{
    CycleLogRepository, MachineRepository, SessionRepository, StopReasonRepository,
    TimeLogRepository,
};
use std::collections::HashMap;

pub const UNSPECIFIED_REASON_NAME: &str = "未指定";

const STATUS_ORDER: [MachineStatus; 4] = [
    MachineStatus::Running,
    MachineStatus::Stopped,
    MachineStatus::Emergency,
    MachineStatus::Idle,
];

pub struct MetricsAggregator {
    ctx: LedgerContext,
}

impl MetricsAggregator {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    fn clipped_logs(&self, filter: &ScopeFilter, window: &TimeWindow) -> EngineResult<Vec<(TimeLog, i64)>> {
        let now = self.ctx.now();
        let logs = TimeLogRepository::new(self.ctx.conn.clone()).list_overlapping(filter, window)?;
        Ok(logs
            .into_iter()
            .map(|log| {
                let secs = log.clipped_seconds(window.start, window.end, now);
                (log, secs)
            })
            .collect())
    }

    // ==========================================
    // 工时 / 稼动率
    // ==========================================

    pub fn time_metrics(&self, filter: &ScopeFilter, window: &TimeWindow) -> EngineResult<TimeMetrics> {
        let _perf = PerfGuard::new("time_metrics");
        let mut per_status: HashMap<MachineStatus, i64> = HashMap::new();
        for (log, secs) in self.clipped_logs(filter, window)? {
            *per_status.entry(log.status).or_insert(0) += secs;
        }

        let seconds_of = |s: MachineStatus| per_status.get(&s).copied().unwrap_or(0);
        let production_seconds = seconds_of(MachineStatus::Running);
        let stop_seconds = seconds_of(MachineStatus::Stopped) + seconds_of(MachineStatus::Emergency);

        Ok(TimeMetrics {
            production_seconds,
            stop_seconds,
            idle_seconds: seconds_of(MachineStatus::Idle),
            efficiency_pct: percentage(production_seconds, production_seconds + stop_seconds),
            by_status: STATUS_ORDER
                .iter()
                .map(|s| StatusDuration {
                    status: Some(*s),
                    seconds: seconds_of(*s),
                })
                .collect(),
        })
    }

    // ==========================================
    // 停机帕累托
    // ==========================================

    pub fn pareto(&self, filter: &ScopeFilter, window: &TimeWindow) -> EngineResult<Vec<ParetoEntry>> {
        let _perf = PerfGuard::new("pareto");
        let reasons = StopReasonRepository::new(self.ctx.conn.clone()).load_index()?;

        // key: stop_reason_id（None = 未指定）
        let mut buckets: HashMap<Option<String>, (i64, i64)> = HashMap::new();
        for (log, secs) in self.clipped_logs(filter, window)? {
            if !log.status.is_stoppage() || secs <= 0 {
                continue;
            }
            let excluded = log
                .stop_reason_id
                .as_ref()
                .and_then(|id| reasons.get(id))
                .map(|r| r.exclude_from_pareto)
                .unwrap_or(false);
            if excluded {
                continue;
            }
            let bucket = buckets.entry(log.stop_reason_id.clone()).or_insert((0, 0));
            bucket.0 += secs;
            bucket.1 += 1;
        }

        let mut entries: Vec<ParetoEntry> = buckets
            .into_iter()
            .map(|(reason_id, (total_seconds, occurrences))| {
                let reason = reason_id.as_ref().and_then(|id| reasons.get(id));
                ParetoEntry {
                    reason_name: match (&reason_id, reason) {
                        (_, Some(r)) => r.name.clone(),
                        (Some(id), None) => id.clone(),
                        (None, None) => UNSPECIFIED_REASON_NAME.to_string(),
                    },
                    category: reason.map(|r| r.category.clone()),
                    stop_reason_id: reason_id,
                    total_seconds,
                    occurrences,
                    percentage: 0.0,
                    cumulative_percentage: 0.0,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.total_seconds
                .cmp(&a.total_seconds)
                .then_with(|| a.reason_name.cmp(&b.reason_name))
        });

        let total: i64 = entries.iter().map(|e| e.total_seconds).sum();
        let mut running = 0;
        for entry in &mut entries {
            running += entry.total_seconds;
            entry.percentage = percentage(entry.total_seconds, total);
            entry.cumulative_percentage = percentage(running, total);
        }
        Ok(entries)
    }

    // ==========================================
    // 节拍
    // ==========================================

    /// 目标节拍 = Σ ⌊会话在窗口内秒数 / 标准节拍⌋（标准节拍 > 0 的机台）
    pub fn cycle_metrics(&self, filter: &ScopeFilter, window: &TimeWindow) -> EngineResult<CycleMetrics> {
        let _perf = PerfGuard::new("cycle_metrics");
        let now = self.ctx.now();

        let cycle_count = CycleLogRepository::new(self.ctx.conn.clone()).count_in_window(filter, window)?;
        let sessions = SessionRepository::new(self.ctx.conn.clone()).list_overlapping_with_nominal(filter, window)?;

        let target_cycles: i64 = sessions
            .iter()
            .filter(|(_, nominal)| *nominal > 0.0)
            .map(|(session, nominal)| {
                let end = session.ended_at.unwrap_or(now);
                let secs = window.overlap_seconds(session.started_at, end);
                (secs as f64 / nominal).floor() as i64
            })
            .sum();

        Ok(CycleMetrics {
            cycle_count,
            target_cycles,
            completion_pct: percentage(cycle_count, target_cycles),
        })
    }

    // ==========================================
    // 单机台工时
    // ==========================================

    pub fn active_time(&self, machine_id: &str, window: &TimeWindow) -> EngineResult<ActiveTime> {
        if MachineRepository::new(self.ctx.conn.clone()).find_by_id(machine_id)?.is_none() {
            return Err(EngineError::not_found("Machine", machine_id));
        }

        let mut active = ActiveTime {
            machine_id: machine_id.to_string(),
            ..Default::default()
        };
        for (log, secs) in self.clipped_logs(&ScopeFilter::for_machine(machine_id), window)? {
            active.tracked_seconds += secs;
            if log.status.is_production() {
                active.running_seconds += secs;
            }
            active.has_open_interval |= log.is_open();
        }
        Ok(active)
    }
}
