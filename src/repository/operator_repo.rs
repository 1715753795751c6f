// ==========================================
// 生产台账引擎 - 操作员分组成员仓储
// ==========================================
// 仅用于校验操作员能否操作某机台（鉴权本身不在本系统内）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct OperatorGroupRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperatorGroupRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn add_member(&self, operator_id: &str, group_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO operator_group_member (operator_id, group_id) VALUES (?1, ?2)",
            params![operator_id, group_id],
        )?;
        Ok(())
    }

    pub fn remove_member(&self, operator_id: &str, group_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM operator_group_member WHERE operator_id = ?1 AND group_id = ?2",
            params![operator_id, group_id],
        )?;
        Ok(rows > 0)
    }

    pub fn is_member_in(conn: &Connection, operator_id: &str, group_id: &str) -> RepositoryResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM operator_group_member WHERE operator_id = ?1 AND group_id = ?2",
            params![operator_id, group_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
