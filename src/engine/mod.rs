// ==========================================
// 铸机排产系统 - 引擎层
// ==========================================
// 职责: 时间轴调度规则(重叠校验、移位、插入规划、生命周期)
// 红线: Engine 不拼 SQL, 只产出变更方案, 由 API 层原子提交
// 红线: 状态集合显式传入(StatusPolicy), 不在引擎内硬编码
// ==========================================

pub mod collaborators;
pub mod error;
pub mod events;
pub mod free_window;
pub mod lifecycle;
pub mod overlap;
pub mod planner;
pub mod shift;
pub mod timeline;

#[cfg(test)]
pub(crate) mod test_fixtures;

// 重导出核心引擎
pub use collaborators::{AlwaysUnstarted, Clock, FixedClock, ProcessStateProbe, SystemClock};
pub use error::{BlockReason, EngineResult, ScheduleError};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, ScheduleEvent, ScheduleEventPublisher,
    ScheduleEventType,
};
pub use free_window::{FreeWindow, FreeWindowFinder};
pub use lifecycle::{LifecycleController, LifecyclePlan, ReanchorOutcome};
pub use overlap::{ConflictReason, OverlapValidator, OverlapVerdict};
pub use planner::{InsertionPlanner, InsertionPreview, MovePlan};
pub use shift::ShiftEngine;
pub use timeline::{classify_slot, SlotClass, Timeline, TimelineEntry};
