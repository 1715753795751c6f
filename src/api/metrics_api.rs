// ==========================================
// 生产台账引擎 - 统计 API
// ==========================================
// 职责: 工时/稼动率、停机帕累托、节拍完成率
// 只读，不取机台锁
// ==========================================

use crate::api::error::ApiResult;
use crate::api::production_api::validate_window;
use crate::domain::metrics::{CycleMetrics, ParetoEntry, ScopeFilter, TimeMetrics, TimeWindow};
use crate::engine::context::LedgerContext;
use crate::engine::metrics::MetricsAggregator;

pub struct MetricsApi {
    aggregator: MetricsAggregator,
}

impl MetricsApi {
    pub fn new(ctx: LedgerContext) -> Self {
        Self {
            aggregator: MetricsAggregator::new(ctx),
        }
    }

    pub fn get_time_metrics(&self, filter: &ScopeFilter, window: &TimeWindow) -> ApiResult<TimeMetrics> {
        validate_window(window)?;
        Ok(self.aggregator.time_metrics(filter, window)?)
    }

    /// 停机帕累托（已排除 exclude_from_pareto 的原因）
    pub fn get_pareto_data(&self, filter: &ScopeFilter, window: &TimeWindow) -> ApiResult<Vec<ParetoEntry>> {
        validate_window(window)?;
        Ok(self.aggregator.pareto(filter, window)?)
    }

    pub fn get_cycle_metrics(&self, filter: &ScopeFilter, window: &TimeWindow) -> ApiResult<CycleMetrics> {
        validate_window(window)?;
        Ok(self.aggregator.cycle_metrics(filter, window)?)
    }
}
