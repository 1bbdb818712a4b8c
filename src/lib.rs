// ==========================================
// 铸机排产系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 铸机时间轴调度(插入/平移/重锚定/对账/取消守卫)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 调度规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ProcessState, SlotKind, SlotStatus, StatusPolicy};

// 领域实体
pub use domain::{ActionLog, ActionType, Slot, SlotAttributes, SlotMove, TimelineChange};

// 引擎
pub use engine::{
    FreeWindowFinder, InsertionPlanner, LifecycleController, OverlapValidator, ScheduleError,
    ShiftEngine, SlotClass, Timeline,
};

// API
pub use api::{ApiError, ApiResult, CreateSlotRequest, ScheduleApi, TimelineUpdate};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "铸机排产系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
