// ==========================================
// 生产台账引擎 - 停机原因仓储
// ==========================================
// 系统原因 "班次结束" 按公司预置，幂等
// ==========================================

use crate::domain::stop_reason::{StopReason, SHIFT_ENDED_REASON_NAME, SYSTEM_REASON_CATEGORY};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const STOP_REASON_COLUMNS: &str =
    "stop_reason_id, company_id, name, category, exclude_from_pareto, is_system";

pub struct StopReasonRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StopReasonRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增普通停机原因
    pub fn create(
        &self,
        company_id: &str,
        name: &str,
        category: &str,
        exclude_from_pareto: bool,
    ) -> RepositoryResult<StopReason> {
        let reason = StopReason {
            stop_reason_id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            exclude_from_pareto,
            is_system: false,
        };
        let conn = self.get_conn()?;
        Self::insert_in(&conn, &reason)?;
        Ok(reason)
    }

    fn insert_in(conn: &Connection, reason: &StopReason) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO stop_reason (
                stop_reason_id, company_id, name, category, exclude_from_pareto, is_system
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                reason.stop_reason_id,
                reason.company_id,
                reason.name,
                reason.category,
                if reason.exclude_from_pareto { 1 } else { 0 },
                if reason.is_system { 1 } else { 0 },
            ],
        )?;
        Ok(())
    }

    /// 预置公司的 "班次结束" 系统原因（已存在则直接返回）
    pub fn ensure_shift_ended_reason(&self, company_id: &str) -> RepositoryResult<StopReason> {
        let conn = self.get_conn()?;
        if let Some(existing) = Self::find_system_in(&conn, company_id)? {
            return Ok(existing);
        }

        let reason = StopReason {
            stop_reason_id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: SHIFT_ENDED_REASON_NAME.to_string(),
            category: SYSTEM_REASON_CATEGORY.to_string(),
            exclude_from_pareto: true,
            is_system: true,
        };
        Self::insert_in(&conn, &reason)?;
        tracing::info!(company_id, stop_reason_id = %reason.stop_reason_id, "预置系统停机原因");
        Ok(reason)
    }

    pub fn find_system_in(conn: &Connection, company_id: &str) -> RepositoryResult<Option<StopReason>> {
        let sql = format!(
            "SELECT {} FROM stop_reason WHERE company_id = ?1 AND is_system = 1",
            STOP_REASON_COLUMNS
        );
        let reason = conn
            .query_row(&sql, params![company_id], map_stop_reason)
            .optional()?;
        Ok(reason)
    }

    pub fn find_by_id(&self, stop_reason_id: &str) -> RepositoryResult<Option<StopReason>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, stop_reason_id)
    }

    pub fn find_by_id_in(conn: &Connection, stop_reason_id: &str) -> RepositoryResult<Option<StopReason>> {
        let sql = format!(
            "SELECT {} FROM stop_reason WHERE stop_reason_id = ?1",
            STOP_REASON_COLUMNS
        );
        let reason = conn
            .query_row(&sql, params![stop_reason_id], map_stop_reason)
            .optional()?;
        Ok(reason)
    }

    pub fn list_by_company(&self, company_id: &str) -> RepositoryResult<Vec<StopReason>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stop_reason WHERE company_id = ?1 ORDER BY name ASC",
            STOP_REASON_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let reasons = stmt
            .query_map(params![company_id], map_stop_reason)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(reasons)
    }

    /// 全部停机原因，按 ID 索引（帕累托统计使用）
    pub fn load_index(&self) -> RepositoryResult<HashMap<String, StopReason>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM stop_reason", STOP_REASON_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let reasons = stmt
            .query_map([], map_stop_reason)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(reasons
            .into_iter()
            .map(|r| (r.stop_reason_id.clone(), r))
            .collect())
    }
}

fn map_stop_reason(row: &Row<'_>) -> SqliteResult<StopReason> {
    let exclude: i32 = row.get(4)?;
    let is_system: i32 = row.get(5)?;
    Ok(StopReason {
        stop_reason_id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        exclude_from_pareto: exclude != 0,
        is_system: is_system != 0,
    })
}
