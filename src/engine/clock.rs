// ==========================================
// 生产台账引擎 - 时钟与日界
// ==========================================
// 所有 "now" 均经 Clock 注入；日界按本地挂钟时间计算
// ==========================================

use crate::domain::metrics::TimeWindow;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// 本地挂钟时间，截断到整秒（与存储精度一致）
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// 手动推进的时钟（测试模拟时间）
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, ts: NaiveDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = ts;
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::seconds(secs);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// ==========================================
// DayBoundary - 日界（每日强制收班时刻）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    pub at: NaiveTime,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            at: NaiveTime::MIN,
        }
    }
}

impl DayBoundary {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// 解析 "HH:MM" 或 "HH:MM:SS"
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
            .map(Self::new)
    }

    /// 严格晚于 now 的下一个日界时刻
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.at);
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }

    /// 业务日窗口 [day@at, day+1@at)
    ///
    /// 日期已到可表示范围末端时返回 None
    pub fn day_window(&self, day: NaiveDate) -> Option<TimeWindow> {
        let start = day.and_time(self.at);
        let end = start.checked_add_signed(Duration::days(1))?;
        Some(TimeWindow::new(start, end))
    }
}
