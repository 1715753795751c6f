use super::core::{map_time_log, TimeLogRepository, TIME_LOG_COLUMNS};
use crate::db::format_ts;
use crate::domain::metrics::{ScopeFilter, TimeWindow};
use crate::domain::time_log::TimeLog;
use crate::repository::error::RepositoryResult;
use crate::repository::scope_sql::build_scope_clause;
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult};

impl TimeLogRepository {
    // ==========================================
    // 单条/会话查询
    // ==========================================

    pub fn find_by_id(&self, time_log_id: &str) -> RepositoryResult<Option<TimeLog>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, time_log_id)
    }

    pub fn find_by_id_in(conn: &Connection, time_log_id: &str) -> RepositoryResult<Option<TimeLog>> {
        let sql = format!("SELECT {} FROM time_log WHERE time_log_id = ?1", TIME_LOG_COLUMNS);
        let log = conn
            .query_row(&sql, params![time_log_id], map_time_log)
            .optional()?;
        Ok(log)
    }

    /// 会话下全部区间，按开始时间排序
    pub fn list_by_session(&self, session_id: &str) -> RepositoryResult<Vec<TimeLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM time_log
            WHERE session_id = ?1
            ORDER BY started_at ASC, matrix_number ASC
            "#,
            TIME_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![session_id], map_time_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    // ==========================================
    // 未关闭区间
    // ==========================================

    /// 机台当前所有未关闭区间（跨会话）
    pub fn list_open_by_machine(&self, machine_id: &str) -> RepositoryResult<Vec<TimeLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM time_log
            WHERE machine_id = ?1 AND ended_at IS NULL
            ORDER BY started_at ASC
            "#,
            TIME_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![machine_id], map_time_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 会话+机台下所有未关闭区间（整机 + 全部模具）
    pub fn find_open_in(
        conn: &Connection,
        session_id: &str,
        machine_id: &str,
    ) -> RepositoryResult<Vec<TimeLog>> {
        let sql = format!(
            r#"
            SELECT {} FROM time_log
            WHERE session_id = ?1 AND machine_id = ?2 AND ended_at IS NULL
            ORDER BY started_at ASC
            "#,
            TIME_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![session_id, machine_id], map_time_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 模具级切换需要关闭的区间: 该模具的区间 + 仍未关闭的整机区间
    pub fn find_open_for_matrix_in(
        conn: &Connection,
        session_id: &str,
        machine_id: &str,
        matrix_id: &str,
    ) -> RepositoryResult<Vec<TimeLog>> {
        let sql = format!(
            r#"
            SELECT {} FROM time_log
            WHERE session_id = ?1 AND machine_id = ?2 AND ended_at IS NULL
              AND (matrix_id = ?3 OR matrix_id IS NULL)
            ORDER BY started_at ASC
            "#,
            TIME_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![session_id, machine_id, matrix_id], map_time_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 开始时间早于 cutoff 且仍未关闭的区间（遗留区间回收使用）
    pub fn find_abandoned(&self, cutoff: NaiveDateTime) -> RepositoryResult<Vec<TimeLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM time_log
            WHERE ended_at IS NULL AND started_at < ?1
            ORDER BY machine_id ASC, started_at ASC
            "#,
            TIME_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![format_ts(cutoff)], map_time_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    // ==========================================
    // 统计查询
    // ==========================================

    /// 与窗口重叠的区间（含未关闭区间），按统计范围过滤
    pub fn list_overlapping(
        &self,
        filter: &ScopeFilter,
        window: &TimeWindow,
    ) -> RepositoryResult<Vec<TimeLog>> {
        let conn = self.get_conn()?;
        Self::list_overlapping_in(&conn, filter, window)
    }

    pub fn list_overlapping_in(
        conn: &Connection,
        filter: &ScopeFilter,
        window: &TimeWindow,
    ) -> RepositoryResult<Vec<TimeLog>> {
        let scope = build_scope_clause(filter, "m", Some("t.operator_id"));
        let columns = TIME_LOG_COLUMNS
            .split(',')
            .map(|c| format!("t.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {}
            FROM time_log t
            JOIN machine m ON m.machine_id = t.machine_id
            WHERE t.started_at < ?
              AND (t.ended_at IS NULL OR t.ended_at > ?)
              {}
            ORDER BY t.started_at ASC
            "#,
            columns, scope.sql
        );

        let mut bind = vec![format_ts(window.end), format_ts(window.start)];
        bind.extend(scope.params);

        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params_from_iter(bind.iter()), map_time_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }
}
