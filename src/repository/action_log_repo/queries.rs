use super::core::ActionLogRepository;
use crate::db::{format_datetime, parse_datetime};
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const LOG_COLUMNS: &str = r#"action_id, caster_id, slot_id, action_type, action_ts, actor,
    payload_json, impact_json, detail"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;

        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?", LOG_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![action_id], map_row) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询指定时间槽的全部操作日志(按时间正序)
    pub fn find_by_slot(&self, slot_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM action_log WHERE slot_id = ? ORDER BY action_ts ASC, rowid ASC",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![slot_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询铸机最近的操作日志(按时间倒序)
    pub fn find_recent_by_caster(&self, caster_id: &str, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM action_log WHERE caster_id = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![caster_id, limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定时间范围的操作日志
    pub fn find_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM action_log WHERE action_ts BETWEEN ? AND ? ORDER BY action_ts DESC",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(
                params![format_datetime(&start_time), format_datetime(&end_time)],
                map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }
}

/// 映射数据库行到ActionLog对象
fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let payload_raw: Option<String> = row.get(6)?;
    let impact_raw: Option<String> = row.get(7)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        caster_id: row.get(1)?,
        slot_id: row.get(2)?,
        action_type: row.get(3)?,
        action_ts: parse_datetime(4, &row.get::<_, String>(4)?)?,
        actor: row.get(5)?,
        payload_json: payload_raw.and_then(|s| serde_json::from_str(&s).ok()),
        impact_json: impact_raw.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(8)?,
    })
}
