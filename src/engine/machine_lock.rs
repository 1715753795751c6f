// ==========================================
// 生产台账引擎 - 机台级互斥
// ==========================================
// 同一机台上的切换 / 开班 / 收班 / 自动收班 / 回收串行执行
// 不同机台互不阻塞
// 加锁顺序: 机台锁 -> 数据库连接锁
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use dashmap::DashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_LOCK_WAIT_MS: u64 = 2_000;

#[derive(Debug, Default)]
struct LockSlot {
    held: Mutex<bool>,
    released: Condvar,
}

/// 机台锁管理器（按 machine_id 分槽）
#[derive(Debug)]
pub struct MachineLockManager {
    slots: DashMap<String, Arc<LockSlot>>,
    wait: Duration,
}

impl Default for MachineLockManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_LOCK_WAIT_MS))
    }
}

impl MachineLockManager {
    pub fn new(wait: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            wait,
        }
    }

    fn slot(&self, machine_id: &str) -> Arc<LockSlot> {
        let entry = self
            .slots
            .entry(machine_id.to_string())
            .or_insert_with(|| Arc::new(LockSlot::default()));
        Arc::clone(&*entry)
    }

    /// 获取机台独占区；超时返回 ConcurrencyConflict
    pub fn acquire(&self, machine_id: &str) -> EngineResult<MachineLockGuard> {
        let slot = self.slot(machine_id);
        let deadline = Instant::now() + self.wait;

        let mut held = slot
            .held
            .lock()
            .map_err(|e| EngineError::ConcurrencyConflict(e.to_string()))?;
        while *held {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(machine_id, wait_ms = self.wait.as_millis() as u64, "机台锁等待超时");
                return Err(EngineError::ConcurrencyConflict(format!(
                    "机台 {} 正在处理其他请求，请重试",
                    machine_id
                )));
            }
            let (guard, _) = slot
                .released
                .wait_timeout(held, remaining)
                .map_err(|e| EngineError::ConcurrencyConflict(e.to_string()))?;
            held = guard;
        }
        *held = true;
        drop(held);

        Ok(MachineLockGuard {
            machine_id: machine_id.to_string(),
            slot,
        })
    }
}

/// 机台独占区凭证，drop 时释放
#[derive(Debug)]
pub struct MachineLockGuard {
    machine_id: String,
    slot: Arc<LockSlot>,
}

impl MachineLockGuard {
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }
}

impl Drop for MachineLockGuard {
    fn drop(&mut self) {
        let mut held = match self.slot.held.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *held = false;
        drop(held);
        self.slot.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_machine_times_out() {
        let locks = MachineLockManager::new(Duration::from_millis(30));
        let _first = locks.acquire("m1").unwrap();
        let err = locks.acquire("m1").unwrap_err();
        assert!(matches!(err, EngineError::ConcurrencyConflict(_)));
    }

    #[test]
    fn test_different_machines_do_not_contend() {
        let locks = MachineLockManager::new(Duration::from_millis(30));
        let a = locks.acquire("m1").unwrap();
        let b = locks.acquire("m2").unwrap();
        assert_eq!(a.machine_id(), "m1");
        assert_eq!(b.machine_id(), "m2");
    }

    #[test]
    fn test_release_on_drop() {
        let locks = MachineLockManager::new(Duration::from_millis(30));
        drop(locks.acquire("m1").unwrap());
        assert!(locks.acquire("m1").is_ok());
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let locks = Arc::new(MachineLockManager::new(Duration::from_secs(5)));
        let guard = locks.acquire("m1").unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire("m1").map(|g| g.machine_id().to_string()))
        };

        thread::sleep(Duration::from_millis(50));
        drop(guard);
        assert_eq!(waiter.join().unwrap().unwrap(), "m1");
    }
}
