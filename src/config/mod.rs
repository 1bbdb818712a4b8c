// ==========================================
// 铸机排产系统 - 配置层
// ==========================================
// 职责: 调度器配置管理(状态集合、工作时段、空闲窗口)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, SchedulerConfig};
