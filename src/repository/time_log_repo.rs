// ==========================================
// 生产台账引擎 - 工时区间台账仓储
// ==========================================
// 红线: 同一 (会话, 机台, matrix_id) 至多一条未关闭区间
// 红线: 区间关闭后不可再修改（关闭操作幂等）
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::TimeLogRepository;
