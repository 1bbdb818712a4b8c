// ==========================================
// 铸机排产系统 - 应用层
// ==========================================
// 职责: 组装仓储/配置/引擎, 向入口提供共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
