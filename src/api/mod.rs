// ==========================================
// 铸机排产系统 - API 层
// ==========================================
// 职责: 提供调度器业务接口,供命令行或外部服务调用
// ==========================================

pub mod caster_lock;
pub mod error;
pub mod schedule_api;

// 重导出核心类型
pub use caster_lock::CasterLockRegistry;
pub use error::{ApiError, ApiResult};
pub use schedule_api::{CreateSlotRequest, ScheduleApi, TimelineUpdate};
