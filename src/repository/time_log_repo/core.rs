use crate::db::{format_ts, parse_enum, parse_opt_ts, parse_ts};
use crate::domain::time_log::{OpenTimeLog, TimeLog};
use crate::domain::types::MachineStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub(super) const TIME_LOG_COLUMNS: &str = r#"
    time_log_id, company_id, session_id, machine_id, matrix_id, matrix_number,
    operator_id, status, stop_reason_id, started_at, ended_at, duration_seconds
"#;

// ==========================================
// TimeLogRepository - 工时区间仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct TimeLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimeLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 打开新区间
    ///
    /// 同一 key 已有未关闭区间时，部分唯一索引会拒绝写入（UniqueConstraintViolation）
    pub fn insert_open_in(conn: &Connection, open: &OpenTimeLog) -> RepositoryResult<TimeLog> {
        let log = TimeLog {
            time_log_id: uuid::Uuid::new_v4().to_string(),
            company_id: open.company_id.clone(),
            session_id: open.session_id.clone(),
            machine_id: open.machine_id.clone(),
            matrix_id: open.matrix_id.clone(),
            matrix_number: open.matrix_number,
            operator_id: open.operator_id.clone(),
            status: open.status,
            stop_reason_id: if open.status.is_stoppage() {
                open.stop_reason_id.clone()
            } else {
                None
            },
            started_at: open.started_at,
            ended_at: None,
            duration_seconds: None,
        };

        conn.execute(
            r#"
            INSERT INTO time_log (
                time_log_id, company_id, session_id, machine_id, matrix_id, matrix_number,
                operator_id, status, stop_reason_id, started_at, ended_at, duration_seconds
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, NULL)
            "#,
            params![
                log.time_log_id,
                log.company_id,
                log.session_id,
                log.machine_id,
                log.matrix_id,
                log.matrix_number,
                log.operator_id,
                log.status.as_str(),
                log.stop_reason_id,
                format_ts(log.started_at),
            ],
        )?;

        tracing::debug!(
            time_log_id = %log.time_log_id,
            machine_id = %log.machine_id,
            matrix_number = ?log.matrix_number,
            status = %log.status,
            "打开工时区间"
        );

        Ok(log)
    }

    /// 关闭区间
    ///
    /// - duration_seconds 只在此处写入一次（负值按 0 计）
    /// - 已关闭的区间不做任何修改，返回 false
    pub fn close_in(conn: &Connection, log: &TimeLog, ended_at: NaiveDateTime) -> RepositoryResult<bool> {
        let duration = (ended_at - log.started_at).num_seconds().max(0);
        let rows = conn.execute(
            r#"
            UPDATE time_log
            SET ended_at = ?1, duration_seconds = ?2
            WHERE time_log_id = ?3 AND ended_at IS NULL
            "#,
            params![format_ts(ended_at), duration, log.time_log_id],
        )?;

        if rows > 0 {
            tracing::debug!(
                time_log_id = %log.time_log_id,
                machine_id = %log.machine_id,
                duration_seconds = duration,
                "关闭工时区间"
            );
        }
        Ok(rows > 0)
    }
}

// ==========================================
// 行映射
// ==========================================
pub(super) fn map_time_log(row: &Row<'_>) -> SqliteResult<TimeLog> {
    let status: String = row.get(7)?;
    let started_at: String = row.get(9)?;
    Ok(TimeLog {
        time_log_id: row.get(0)?,
        company_id: row.get(1)?,
        session_id: row.get(2)?,
        machine_id: row.get(3)?,
        matrix_id: row.get(4)?,
        matrix_number: row.get(5)?,
        operator_id: row.get(6)?,
        status: parse_enum(7, &status, MachineStatus::parse)?,
        stop_reason_id: row.get(8)?,
        started_at: parse_ts(9, &started_at)?,
        ended_at: parse_opt_ts(10, row.get(10)?)?,
        duration_seconds: row.get(11)?,
    })
}
