// ==========================================
// 生产台账引擎 - 操作日志数据仓储
// ==========================================
// 红线: 台账写入与留痕同事务
// 对齐: action_log 表
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
