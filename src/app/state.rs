// ==========================================
// 铸机排产系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ScheduleApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{Clock, ScheduleEventPublisher, SystemClock};
use crate::repository::{ActionLogRepository, ProcessLinkRepository, SlotRepository};

/// 应用状态
///
/// 包含API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 时间轴调度API
    pub schedule_api: Arc<ScheduleApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例（系统时钟, 无事件发布器）
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_collaborators(db_path, Arc::new(SystemClock), None)
    }

    /// 创建AppState并注入时钟与事件发布器
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并初始化 schema（幂等）
    /// 2. 初始化所有Repository
    /// 3. 创建ScheduleApi
    pub fn with_collaborators(
        db_path: String,
        clock: Arc<dyn Clock>,
        event_publisher: Option<Arc<dyn ScheduleEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;

        match read_schema_version(&conn) {
            Ok(Some(v)) if v == CURRENT_SCHEMA_VERSION => {}
            Ok(v) => tracing::warn!(
                found = ?v,
                expected = CURRENT_SCHEMA_VERSION,
                "schema_version 与当前代码不一致"
            ),
            Err(e) => tracing::warn!("读取 schema_version 失败: {}", e),
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let slot_repo = Arc::new(SlotRepository::new(conn.clone()));
        let process_repo = Arc::new(ProcessLinkRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let schedule_api = Arc::new(ScheduleApi::new(
            slot_repo,
            process_repo,
            action_log_repo.clone(),
            config_manager.clone(),
            clock,
            event_publisher,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            schedule_api,
            config_manager,
            action_log_repo,
        })
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 CASTER_APS_DB_PATH（非空时）
/// - 开发环境: 用户数据目录/caster-aps-dev/caster_aps.db
/// - 生产环境: 用户数据目录/caster-aps/caster_aps.db
/// - 无用户数据目录时: ./caster_aps.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CASTER_APS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./caster_aps.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("caster-aps-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("caster-aps");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("caster_aps.db");
        }
    }

    path.to_string_lossy().to_string()
}
