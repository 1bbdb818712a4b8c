// ==========================================
// 铸机排产系统 - 关联工序状态仓储
// ==========================================
// 关联工序: 熔炼批次 (Draft → Charging → Melting → ReadyForTransfer → Transferred)
// 用途: 判断名义可移动的时间槽是否已被外部工序冻结
// ==========================================

use crate::db::{format_datetime, parse_datetime};
use crate::domain::types::ProcessState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 关联工序记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedProcessRecord {
    pub process_ref: String,
    pub state: ProcessState,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// ProcessLinkRepository
// ==========================================
pub struct ProcessLinkRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessLinkRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询工序记录
    pub fn find(&self, process_ref: &str) -> RepositoryResult<Option<LinkedProcessRecord>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT process_ref, state, updated_at FROM linked_process WHERE process_ref = ?1",
            params![process_ref],
            |row| {
                let state_raw: String = row.get(1)?;
                let state = ProcessState::from_str(&state_raw).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        format!("未知的工序状态: {}", state_raw).into(),
                    )
                })?;
                Ok(LinkedProcessRecord {
                    process_ref: row.get(0)?,
                    state,
                    updated_at: parse_datetime(2, &row.get::<_, String>(2)?)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询工序状态
    pub fn find_state(&self, process_ref: &str) -> RepositoryResult<Option<ProcessState>> {
        Ok(self.find(process_ref)?.map(|r| r.state))
    }

    /// 写入工序状态(存在则覆盖)
    ///
    /// 同一事务内递增所有关联时间槽的 revision, 基于旧分类的提交会因乐观锁失败
    /// 转换合法性由调用方校验
    ///
    /// # 返回
    /// - 受影响的关联时间槽数
    pub fn upsert_state(
        &self,
        process_ref: &str,
        state: ProcessState,
        updated_at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO linked_process (process_ref, state, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(process_ref) DO UPDATE SET
                   state = excluded.state,
                   updated_at = excluded.updated_at"#,
            params![process_ref, state.to_db_str(), format_datetime(&updated_at)],
        )?;

        let touched = tx.execute(
            "UPDATE caster_slot SET revision = revision + 1 WHERE linked_process_ref = ?1",
            params![process_ref],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(touched)
    }
}
