// ==========================================
// 铸机排产系统 - 时间槽数据仓储 (Timeline Store)
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 一次变更集必须在同一事务内提交(全部成功或全部回滚)
// ==========================================

use crate::db::{format_datetime, parse_datetime, parse_optional_datetime};
use crate::domain::slot::{Slot, SlotAttributes, TimelineChange};
use crate::domain::types::{SlotKind, SlotStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const SLOT_COLUMNS: &str = r#"slot_id, caster_id, kind, status, planned_start, planned_end,
    planned_duration_sec, actual_start, actual_end, process_started_at,
    linked_process_ref, attrs_json, created_by, created_at, updated_at, revision"#;

// ==========================================
// SlotRepository - 时间槽仓储
// ==========================================
pub struct SlotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SlotRepository {
    /// 创建新的SlotRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入单个时间槽
    pub fn insert(&self, slot: &Slot) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        insert_slot(&tx, slot)?;
        tx.commit()?;
        Ok(slot.slot_id.clone())
    }

    /// 按slot_id查询
    ///
    /// # 返回
    /// - `Ok(Some(Slot))`: 找到
    /// - `Ok(None)`: 不存在
    pub fn find_by_id(&self, slot_id: &str) -> RepositoryResult<Option<Slot>> {
        let conn = self.get_conn()?;

        let sql = format!("SELECT {} FROM caster_slot WHERE slot_id = ?1", SLOT_COLUMNS);
        match conn.query_row(&sql, params![slot_id], map_slot_row) {
            Ok(slot) => Ok(Some(slot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询铸机的完整时间轴（含取消的时间槽）
    ///
    /// 排序: planned_start, planned_end, slot_id（保证稳定的扫描顺序）
    pub fn list_by_caster(&self, caster_id: &str) -> RepositoryResult<Vec<Slot>> {
        let conn = self.get_conn()?;

        let sql = format!(
            r#"SELECT {} FROM caster_slot
               WHERE caster_id = ?1
               ORDER BY planned_start, planned_end, slot_id"#,
            SLOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let slots = stmt
            .query_map(params![caster_id], map_slot_row)?
            .collect::<Result<Vec<Slot>, _>>()?;

        Ok(slots)
    }

    /// 查询与 [from, to) 有交集的时间槽
    ///
    /// - include_cancelled=false 时过滤 NOT_PRODUCED
    pub fn list_in_range(
        &self,
        caster_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        include_cancelled: bool,
    ) -> RepositoryResult<Vec<Slot>> {
        let conn = self.get_conn()?;

        let mut sql = format!(
            r#"SELECT {} FROM caster_slot
               WHERE caster_id = ?1 AND planned_start < ?2 AND planned_end > ?3"#,
            SLOT_COLUMNS
        );
        if !include_cancelled {
            sql.push_str(" AND status != 'NOT_PRODUCED'");
        }
        sql.push_str(" ORDER BY planned_start, planned_end, slot_id");

        let mut stmt = conn.prepare(&sql)?;
        let slots = stmt
            .query_map(
                params![caster_id, format_datetime(&to), format_datetime(&from)],
                map_slot_row,
            )?
            .collect::<Result<Vec<Slot>, _>>()?;

        Ok(slots)
    }

    /// 查询所有铸机ID
    pub fn list_casters(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT caster_id FROM caster_slot ORDER BY caster_id")?;
        let casters = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(casters)
    }

    /// 查询关联到指定工序的时间槽所在铸机(按铸机ID排序)
    pub fn list_casters_linked_to(&self, process_ref: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT caster_id FROM caster_slot WHERE linked_process_ref = ?1 ORDER BY caster_id",
        )?;
        let casters = stmt
            .query_map(params![process_ref], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(casters)
    }

    /// 原子提交一次时间轴变更
    ///
    /// # 并发控制
    /// 每行更新带 revision 检查；任一行冲突则整个事务回滚
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配
    /// - `RepositoryError::NotFound`: slot_id不存在
    pub fn commit(&self, change: &TimelineChange) -> RepositoryResult<()> {
        if change.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for slot in &change.updated {
            update_slot(&tx, slot)?;
        }
        if let Some(slot) = &change.inserted {
            insert_slot(&tx, slot)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// 行级读写
// ==========================================

fn attrs_to_json(attrs: &SlotAttributes) -> RepositoryResult<String> {
    serde_json::to_string(attrs).map_err(|e| RepositoryError::FieldValueError {
        field: "attrs_json".to_string(),
        message: e.to_string(),
    })
}

fn insert_slot(tx: &Transaction<'_>, slot: &Slot) -> RepositoryResult<()> {
    let attrs_json = attrs_to_json(&slot.attrs)?;

    tx.execute(
        r#"INSERT INTO caster_slot (
                slot_id, caster_id, kind, status, planned_start, planned_end,
                planned_duration_sec, actual_start, actual_end, process_started_at,
                linked_process_ref, attrs_json, created_by, created_at, updated_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"#,
        params![
            &slot.slot_id,
            &slot.caster_id,
            slot.kind.to_db_str(),
            slot.status.to_db_str(),
            format_datetime(&slot.planned_start),
            format_datetime(&slot.planned_end),
            &slot.planned_duration_sec,
            slot.actual_start.as_ref().map(format_datetime),
            slot.actual_end.as_ref().map(format_datetime),
            slot.process_started_at.as_ref().map(format_datetime),
            &slot.linked_process_ref,
            attrs_json,
            &slot.created_by,
            format_datetime(&slot.created_at),
            format_datetime(&slot.updated_at),
            &slot.revision,
        ],
    )?;

    Ok(())
}

fn update_slot(tx: &Transaction<'_>, slot: &Slot) -> RepositoryResult<()> {
    let attrs_json = attrs_to_json(&slot.attrs)?;

    let rows_affected = tx.execute(
        r#"UPDATE caster_slot
           SET status = ?1, planned_start = ?2, planned_end = ?3, planned_duration_sec = ?4,
               actual_start = ?5, actual_end = ?6, process_started_at = ?7,
               linked_process_ref = ?8, attrs_json = ?9, updated_at = ?10,
               revision = revision + 1
           WHERE slot_id = ?11 AND revision = ?12"#,
        params![
            slot.status.to_db_str(),
            format_datetime(&slot.planned_start),
            format_datetime(&slot.planned_end),
            &slot.planned_duration_sec,
            slot.actual_start.as_ref().map(format_datetime),
            slot.actual_end.as_ref().map(format_datetime),
            slot.process_started_at.as_ref().map(format_datetime),
            &slot.linked_process_ref,
            attrs_json,
            format_datetime(&slot.updated_at),
            &slot.slot_id,
            &slot.revision,
        ],
    )?;

    if rows_affected == 0 {
        // 判断是记录不存在还是revision冲突
        let actual: Result<i32, _> = tx.query_row(
            "SELECT revision FROM caster_slot WHERE slot_id = ?1",
            params![&slot.slot_id],
            |row| row.get(0),
        );

        return match actual {
            Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                slot_id: slot.slot_id.clone(),
                expected: slot.revision,
                actual: actual_revision,
            }),
            Err(_) => Err(RepositoryError::NotFound {
                entity: "CasterSlot".to_string(),
                id: slot.slot_id.clone(),
            }),
        };
    }

    Ok(())
}

/// 映射数据库行到Slot对象
fn map_slot_row(row: &Row) -> rusqlite::Result<Slot> {
    let kind_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let attrs_raw: Option<String> = row.get(11)?;

    let kind = SlotKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("未知的时间槽类型: {}", kind_str).into(),
        )
    })?;
    let status = SlotStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("未知的时间槽状态: {}", status_str).into(),
        )
    })?;
    let attrs = match attrs_raw {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?,
        _ => SlotAttributes::default(),
    };

    Ok(Slot {
        slot_id: row.get(0)?,
        caster_id: row.get(1)?,
        kind,
        status,
        planned_start: parse_datetime(4, &row.get::<_, String>(4)?)?,
        planned_end: parse_datetime(5, &row.get::<_, String>(5)?)?,
        planned_duration_sec: row.get(6)?,
        actual_start: parse_optional_datetime(7, row.get(7)?)?,
        actual_end: parse_optional_datetime(8, row.get(8)?)?,
        process_started_at: parse_optional_datetime(9, row.get(9)?)?,
        linked_process_ref: row.get(10)?,
        attrs,
        created_by: row.get(12)?,
        created_at: parse_datetime(13, &row.get::<_, String>(13)?)?,
        updated_at: parse_datetime(14, &row.get::<_, String>(14)?)?,
        revision: row.get(15)?,
    })
}
