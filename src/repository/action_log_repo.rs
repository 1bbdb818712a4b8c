// ==========================================
// 铸机排产系统 - 操作日志数据仓储
// ==========================================
// 红线: 所有时间轴写入必须记录
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
