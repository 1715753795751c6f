// ==========================================
// 生产台账引擎 - 类型化运行参数
// ==========================================
// 从 config_kv 解析；缺失或非法值回退默认值并告警
// ==========================================

use crate::config::config_manager::{config_keys, ConfigManager};
use crate::engine::clock::DayBoundary;
use crate::engine::machine_lock::DEFAULT_LOCK_WAIT_MS;
use chrono::Duration;
use std::error::Error;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_ABANDONED_LOG_THRESHOLD_HOURS: i64 = 24;
/// 回收阈值上限（10 年）
pub const MAX_ABANDONED_LOG_THRESHOLD_HOURS: i64 = 24 * 366 * 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSettings {
    pub day_boundary: DayBoundary,
    pub abandoned_log_threshold_hours: i64,
    pub machine_lock_wait_ms: u64,
    pub auto_close_enabled: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            day_boundary: DayBoundary::default(),
            abandoned_log_threshold_hours: DEFAULT_ABANDONED_LOG_THRESHOLD_HOURS,
            machine_lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
            auto_close_enabled: true,
        }
    }
}

impl LedgerSettings {
    pub fn load(config: &ConfigManager) -> Result<Self, Box<dyn Error>> {
        let defaults = Self::default();

        let day_boundary = match config.get_global_config_value(config_keys::DAY_BOUNDARY)? {
            None => defaults.day_boundary,
            Some(raw) => DayBoundary::parse(&raw).unwrap_or_else(|| {
                warn!(key = config_keys::DAY_BOUNDARY, value = %raw, "配置值非法，使用默认值");
                defaults.day_boundary
            }),
        };

        let abandoned_log_threshold_hours = parse_or_default(
            config,
            config_keys::ABANDONED_LOG_THRESHOLD_HOURS,
            defaults.abandoned_log_threshold_hours,
            |v: &i64| (1..=MAX_ABANDONED_LOG_THRESHOLD_HOURS).contains(v),
        )?;
        let machine_lock_wait_ms = parse_or_default(
            config,
            config_keys::MACHINE_LOCK_WAIT_MS,
            defaults.machine_lock_wait_ms,
            |v: &u64| *v > 0,
        )?;
        let auto_close_enabled = parse_or_default(
            config,
            config_keys::AUTO_CLOSE_ENABLED,
            defaults.auto_close_enabled,
            |_| true,
        )?;

        Ok(Self {
            day_boundary,
            abandoned_log_threshold_hours,
            machine_lock_wait_ms,
            auto_close_enabled,
        })
    }

    pub fn abandoned_log_threshold(&self) -> Duration {
        let hours = self
            .abandoned_log_threshold_hours
            .clamp(1, MAX_ABANDONED_LOG_THRESHOLD_HOURS);
        Duration::hours(hours)
    }

    pub fn machine_lock_wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.machine_lock_wait_ms)
    }
}

fn parse_or_default<T>(
    config: &ConfigManager,
    key: &str,
    default: T,
    accept: impl Fn(&T) -> bool,
) -> Result<T, Box<dyn Error>>
where
    T: FromStr + Copy,
{
    let raw = match config.get_global_config_value(key)? {
        Some(raw) => raw,
        None => return Ok(default),
    };
    match raw.trim().parse::<T>() {
        Ok(v) if accept(&v) => Ok(v),
        _ => {
            warn!(key, value = %raw, "配置值非法，使用默认值");
            Ok(default)
        }
    }
}
