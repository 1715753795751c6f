// ==========================================
// 生产台账引擎 - 批处理结果
// ==========================================
// 自动收班 / 遗留区间回收逐项处理，单项失败只记录不中断
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub item_id: String, // session_id 或 time_log_id
    pub machine_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// 列出的候选项数 = succeeded + failed + skipped
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 加锁前已被其他流程处理，无需动作
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn record_success(&mut self, count: usize) {
        self.total += count;
        self.succeeded += count;
    }

    pub fn record_skipped(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, item_id: &str, machine_id: &str, message: impl Into<String>) {
        self.total += 1;
        self.failed += 1;
        self.failures.push(BatchFailure {
            item_id: item_id.to_string(),
            machine_id: machine_id.to_string(),
            message: message.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
