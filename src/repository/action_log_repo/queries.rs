use super::core::{ActionLogRepository, ACTION_LOG_COLUMNS};
use crate::db::{format_ts, parse_ts};
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?1", ACTION_LOG_COLUMNS);
        let log = conn.query_row(&sql, params![action_id], map_row).optional()?;
        Ok(log)
    }

    /// 机台操作日志（时间倒序）
    pub fn find_by_machine(&self, machine_id: &str, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM action_log
            WHERE machine_id = ?1
            ORDER BY action_ts DESC, rowid DESC
            LIMIT ?2
            "#,
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![machine_id, limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 会话下全部操作日志（时间正序）
    pub fn find_by_session(&self, session_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM action_log
            WHERE session_id = ?1
            ORDER BY action_ts ASC, rowid ASC
            "#,
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![session_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 指定时间范围（闭区间）内的操作日志
    pub fn find_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM action_log
            WHERE action_ts BETWEEN ?1 AND ?2
            ORDER BY action_ts DESC, rowid DESC
            "#,
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![format_ts(start_time), format_ts(end_time)], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn count_by_type(&self, action_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?1",
            params![action_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_row(row: &Row<'_>) -> SqliteResult<ActionLog> {
    let action_ts: String = row.get(3)?;
    let payload: Option<String> = row.get(7)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        company_id: row.get(1)?,
        action_type: row.get(2)?,
        action_ts: parse_ts(3, &action_ts)?,
        actor: row.get(4)?,
        machine_id: row.get(5)?,
        session_id: row.get(6)?,
        // 损坏的 JSON 不影响读取其余字段
        payload_json: payload.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(8)?,
    })
}
