// ==========================================
// 生产台账引擎 - 节拍记录仓储
// ==========================================
// 只追加，仅用于计数
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::metrics::{ScopeFilter, TimeWindow};
use crate::domain::time_log::CycleLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::scope_sql::build_scope_clause;
use rusqlite::{params, params_from_iter, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct CycleLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CycleLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert_in(conn: &Connection, log: &CycleLog) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO cycle_log (
                cycle_log_id, session_id, machine_id, matrix_id, operator_id, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                log.cycle_log_id,
                log.session_id,
                log.machine_id,
                log.matrix_id,
                log.operator_id,
                format_ts(log.completed_at),
            ],
        )?;
        Ok(())
    }

    pub fn list_by_session(&self, session_id: &str) -> RepositoryResult<Vec<CycleLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT cycle_log_id, session_id, machine_id, matrix_id, operator_id, completed_at
            FROM cycle_log
            WHERE session_id = ?1
            ORDER BY completed_at ASC
            "#,
        )?;
        let logs = stmt
            .query_map(params![session_id], |row| {
                let completed_at: String = row.get(5)?;
                Ok(CycleLog {
                    cycle_log_id: row.get(0)?,
                    session_id: row.get(1)?,
                    machine_id: row.get(2)?,
                    matrix_id: row.get(3)?,
                    operator_id: row.get(4)?,
                    completed_at: parse_ts(5, &completed_at)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 窗口 [start, end) 内完成的节拍数
    pub fn count_in_window(&self, filter: &ScopeFilter, window: &TimeWindow) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let scope = build_scope_clause(filter, "m", Some("c.operator_id"));
        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM cycle_log c
            JOIN machine m ON m.machine_id = c.machine_id
            WHERE c.completed_at >= ? AND c.completed_at < ?
              {}
            "#,
            scope.sql
        );

        let mut bind = vec![format_ts(window.start), format_ts(window.end)];
        bind.extend(scope.params);

        let count: i64 = conn.query_row(&sql, params_from_iter(bind.iter()), |row| row.get(0))?;
        Ok(count)
    }
}
