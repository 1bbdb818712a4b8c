// ==========================================
// 铸机排产系统 - 领域模型层
// ==========================================
// 职责: 定义时间槽实体、状态类型、操作日志
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod slot;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use slot::{Slot, SlotAttributes, SlotMove, TimelineChange};
pub use types::{ProcessState, SlotKind, SlotStatus, StatusPolicy};
