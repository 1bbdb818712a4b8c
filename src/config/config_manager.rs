// ==========================================
// 铸机排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 红线: 配置非法时回退默认值并告警, 不中断排产
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{SlotStatus, StatusPolicy};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 默认工作时段 06:00-22:00
pub const DEFAULT_DAY_WINDOW_START_HOUR: u32 = 6;
pub const DEFAULT_DAY_WINDOW_END_HOUR: u32 = 22;

/// 默认最小空闲窗口(分钟)
pub const DEFAULT_MIN_FREE_WINDOW_MINUTES: i64 = 60;

// ==========================================
// SchedulerConfig - 调度器配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub status_policy: StatusPolicy,
    pub day_window_start_hour: u32,
    pub day_window_end_hour: u32,
    pub min_free_window_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            status_policy: StatusPolicy::default(),
            day_window_start_hour: DEFAULT_DAY_WINDOW_START_HOUR,
            day_window_end_hour: DEFAULT_DAY_WINDOW_END_HOUR,
            min_free_window_minutes: DEFAULT_MIN_FREE_WINDOW_MINUTES,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值(存在则覆盖)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 状态集合 =====

    /// 获取可移动/锁定状态集合
    ///
    /// # 说明
    /// 配置格式为 JSON 数组: ["PLANNED","RELEASED"]
    /// 缺失时使用默认集合; 存在未知状态或两集合相交时回退默认并告警
    pub fn get_status_policy(&self) -> Result<StatusPolicy, Box<dyn Error>> {
        let defaults = StatusPolicy::default();

        let movable = match self.get_config_value(config_keys::MOVABLE_STATUSES)? {
            Some(raw) => parse_status_list(config_keys::MOVABLE_STATUSES, &raw),
            None => Some(defaults.movable_statuses().collect()),
        };
        let locked = match self.get_config_value(config_keys::LOCKED_STATUSES)? {
            Some(raw) => parse_status_list(config_keys::LOCKED_STATUSES, &raw),
            None => Some(defaults.locked_statuses().collect()),
        };

        let (movable, locked) = match (movable, locked) {
            (Some(m), Some(l)) => (m, l),
            _ => return Ok(defaults),
        };

        match StatusPolicy::new(movable, locked) {
            Ok(policy) => Ok(policy),
            Err(reason) => {
                tracing::warn!(reason = %reason, "状态集合配置非法,使用默认集合");
                Ok(defaults)
            }
        }
    }

    // ===== 工作时段 =====

    /// 获取工作时段 (起始小时, 结束小时)
    pub fn get_day_window_hours(&self) -> Result<(u32, u32), Box<dyn Error>> {
        let start = self.get_u32_or_default(
            config_keys::DAY_WINDOW_START_HOUR,
            DEFAULT_DAY_WINDOW_START_HOUR,
        )?;
        let end = self.get_u32_or_default(config_keys::DAY_WINDOW_END_HOUR, DEFAULT_DAY_WINDOW_END_HOUR)?;

        if start >= end || end > 24 {
            tracing::warn!(start, end, "工作时段配置非法,使用默认 06-22");
            return Ok((DEFAULT_DAY_WINDOW_START_HOUR, DEFAULT_DAY_WINDOW_END_HOUR));
        }
        Ok((start, end))
    }

    /// 获取默认最小空闲窗口(分钟)
    pub fn get_min_free_window_minutes(&self) -> Result<i64, Box<dyn Error>> {
        let value = self
            .get_config_value(config_keys::MIN_FREE_WINDOW_MINUTES)?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0);
        Ok(value.unwrap_or(DEFAULT_MIN_FREE_WINDOW_MINUTES))
    }

    /// 一次性加载调度器配置
    pub fn load_scheduler_config(&self) -> Result<SchedulerConfig, Box<dyn Error>> {
        let (day_window_start_hour, day_window_end_hour) = self.get_day_window_hours()?;
        Ok(SchedulerConfig {
            status_policy: self.get_status_policy()?,
            day_window_start_hour,
            day_window_end_hour,
            min_free_window_minutes: self.get_min_free_window_minutes()?,
        })
    }

    fn get_u32_or_default(&self, key: &str, default: u32) -> Result<u32, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(v) => Ok(v),
                Err(e) => {
                    tracing::warn!(config_key = key, value = %raw, "配置解析失败: {}, 使用默认值 {}", e, default);
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }
}

/// 解析状态数组; 失败返回 None 并告警
fn parse_status_list(key: &str, raw: &str) -> Option<Vec<SlotStatus>> {
    let names: Vec<String> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(config_key = key, "状态集合不是 JSON 字符串数组: {}", e);
            return None;
        }
    };

    let mut statuses = Vec::with_capacity(names.len());
    for name in &names {
        match SlotStatus::from_str(name) {
            Some(s) => statuses.push(s),
            None => {
                tracing::warn!(config_key = key, status = %name, "未知的时间槽状态");
                return None;
            }
        }
    }
    Some(statuses)
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 状态集合 (JSON 数组)
    pub const MOVABLE_STATUSES: &str = "movable_statuses";
    pub const LOCKED_STATUSES: &str = "locked_statuses";

    // 工作时段
    pub const DAY_WINDOW_START_HOUR: &str = "day_window_start_hour";
    pub const DAY_WINDOW_END_HOUR: &str = "day_window_end_hour";

    // 空闲窗口
    pub const MIN_FREE_WINDOW_MINUTES: &str = "min_free_window_minutes";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let manager = setup();
        let config = manager.load_scheduler_config().unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_custom_status_sets() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::MOVABLE_STATUSES, r#"["PLANNED"]"#)
            .unwrap();
        manager
            .set_global_config_value(
                config_keys::LOCKED_STATUSES,
                r#"["RELEASED","MELTING","METAL_READY","CASTING","COILS_COMPLETE"]"#,
            )
            .unwrap();

        let policy = manager.get_status_policy().unwrap();
        assert!(policy.is_movable(SlotStatus::Planned));
        assert!(policy.is_locked(SlotStatus::Released));
    }

    #[test]
    fn test_invalid_status_sets_fall_back() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::MOVABLE_STATUSES, r#"["PLANNED","CASTING"]"#)
            .unwrap();
        assert_eq!(manager.get_status_policy().unwrap(), StatusPolicy::default());

        manager
            .set_global_config_value(config_keys::MOVABLE_STATUSES, r#"["PLANNED","WAITING"]"#)
            .unwrap();
        assert_eq!(manager.get_status_policy().unwrap(), StatusPolicy::default());
    }

    #[test]
    fn test_day_window_validation_and_snapshot() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::DAY_WINDOW_START_HOUR, "8")
            .unwrap();
        manager
            .set_global_config_value(config_keys::DAY_WINDOW_END_HOUR, "20")
            .unwrap();
        assert_eq!(manager.get_day_window_hours().unwrap(), (8, 20));

        manager
            .set_global_config_value(config_keys::DAY_WINDOW_END_HOUR, "7")
            .unwrap();
        assert_eq!(manager.get_day_window_hours().unwrap(), (6, 22));

        let snapshot: HashMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get(config_keys::DAY_WINDOW_START_HOUR).map(String::as_str), Some("8"));
    }
}
