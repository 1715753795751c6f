// ==========================================
// 生产台账引擎 - 生产会话数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{format_ts, parse_opt_ts, parse_ts};
use crate::domain::metrics::{ScopeFilter, TimeWindow};
use crate::domain::session::ProductionSession;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::scope_sql::build_scope_clause;
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SESSION_COLUMNS: &str =
    "session_id, company_id, machine_id, operator_id, started_at, ended_at, active";

// ==========================================
// SessionRepository - 生产会话仓储
// ==========================================
pub struct SessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert_in(conn: &Connection, session: &ProductionSession) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO production_session (
                session_id, company_id, machine_id, operator_id, started_at, ended_at, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                session.session_id,
                session.company_id,
                session.machine_id,
                session.operator_id,
                format_ts(session.started_at),
                session.ended_at.map(format_ts),
                if session.active { 1 } else { 0 },
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, session_id: &str) -> RepositoryResult<Option<ProductionSession>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, session_id)
    }

    pub fn find_by_id_in(conn: &Connection, session_id: &str) -> RepositoryResult<Option<ProductionSession>> {
        let sql = format!(
            "SELECT {} FROM production_session WHERE session_id = ?1",
            SESSION_COLUMNS
        );
        let session = conn
            .query_row(&sql, params![session_id], map_session)
            .optional()?;
        Ok(session)
    }

    /// 查询机台当前 active 会话（不区分操作员）
    pub fn find_active_by_machine(&self, machine_id: &str) -> RepositoryResult<Option<ProductionSession>> {
        let conn = self.get_conn()?;
        Self::find_active_by_machine_in(&conn, machine_id)
    }

    pub fn find_active_by_machine_in(
        conn: &Connection,
        machine_id: &str,
    ) -> RepositoryResult<Option<ProductionSession>> {
        let sql = format!(
            r#"
            SELECT {} FROM production_session
            WHERE machine_id = ?1 AND active = 1
            ORDER BY started_at DESC
            LIMIT 1
            "#,
            SESSION_COLUMNS
        );
        let session = conn
            .query_row(&sql, params![machine_id], map_session)
            .optional()?;
        Ok(session)
    }

    /// 查询 (机台, 操作员) 的 active 会话
    pub fn find_active_in(
        conn: &Connection,
        machine_id: &str,
        operator_id: &str,
    ) -> RepositoryResult<Option<ProductionSession>> {
        let sql = format!(
            r#"
            SELECT {} FROM production_session
            WHERE machine_id = ?1 AND operator_id = ?2 AND active = 1
            ORDER BY started_at DESC
            LIMIT 1
            "#,
            SESSION_COLUMNS
        );
        let session = conn
            .query_row(&sql, params![machine_id, operator_id], map_session)
            .optional()?;
        Ok(session)
    }

    /// 全系统 active 会话（自动收班使用）
    pub fn list_active(&self) -> RepositoryResult<Vec<ProductionSession>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM production_session WHERE active = 1 ORDER BY started_at ASC",
            SESSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map([], map_session)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(sessions)
    }

    /// 操作员在 [from, to) 内开始的最早会话时间
    pub fn find_first_start_by_operator(
        &self,
        operator_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Option<NaiveDateTime>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn.query_row(
            r#"
            SELECT MIN(started_at) FROM production_session
            WHERE operator_id = ?1 AND started_at >= ?2 AND started_at < ?3
            "#,
            params![operator_id, format_ts(from), format_ts(to)],
            |row| row.get(0),
        )?;
        Ok(parse_opt_ts(0, raw)?)
    }

    /// 关闭会话（仅对 active 会话生效，返回是否实际更新）
    pub fn close_in(
        conn: &Connection,
        session_id: &str,
        ended_at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let rows = conn.execute(
            r#"
            UPDATE production_session
            SET active = 0, ended_at = ?1
            WHERE session_id = ?2 AND active = 1
            "#,
            params![format_ts(ended_at), session_id],
        )?;
        Ok(rows > 0)
    }

    /// 范围内与窗口重叠的会话，附带机台标准节拍（秒）
    pub fn list_overlapping_with_nominal(
        &self,
        filter: &ScopeFilter,
        window: &TimeWindow,
    ) -> RepositoryResult<Vec<(ProductionSession, f64)>> {
        let conn = self.get_conn()?;
        let scope = build_scope_clause(filter, "m", Some("s.operator_id"));
        let sql = format!(
            r#"
            SELECT s.session_id, s.company_id, s.machine_id, s.operator_id,
                   s.started_at, s.ended_at, s.active, m.nominal_cycle_seconds
            FROM production_session s
            JOIN machine m ON m.machine_id = s.machine_id
            WHERE s.started_at < ?
              AND (s.ended_at IS NULL OR s.ended_at > ?)
              {}
            ORDER BY s.started_at ASC
            "#,
            scope.sql
        );

        let mut bind = vec![format_ts(window.end), format_ts(window.start)];
        bind.extend(scope.params);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok((map_session(row)?, row.get::<_, f64>(7)?))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_session(row: &Row<'_>) -> SqliteResult<ProductionSession> {
    let started_at: String = row.get(4)?;
    let active: i32 = row.get(6)?;
    Ok(ProductionSession {
        session_id: row.get(0)?,
        company_id: row.get(1)?,
        machine_id: row.get(2)?,
        operator_id: row.get(3)?,
        started_at: parse_ts(4, &started_at)?,
        ended_at: parse_opt_ts(5, row.get(5)?)?,
        active: active != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn session(id: &str, machine: &str, operator: &str, start: NaiveDateTime) -> ProductionSession {
        ProductionSession {
            session_id: id.to_string(),
            company_id: "c1".to_string(),
            machine_id: machine.to_string(),
            operator_id: operator.to_string(),
            started_at: start,
            ended_at: None,
            active: true,
        }
    }

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = open_in_memory_shared().unwrap();
        conn.lock()
            .unwrap()
            .execute_batch(
                r#"
                INSERT INTO machine (machine_id, company_id, group_id, code, nominal_cycle_seconds)
                  VALUES ('m1', 'c1', 'g1', 'M-01', 60), ('m2', 'c1', 'g2', 'M-02', 30);
                "#,
            )
            .unwrap();
        conn
    }

    #[test]
    fn test_one_active_session_per_machine() {
        let conn = setup();
        let c = conn.lock().unwrap();
        SessionRepository::insert_in(&c, &session("s1", "m1", "op1", at(8, 0))).unwrap();
        let err = SessionRepository::insert_in(&c, &session("s2", "m1", "op2", at(8, 5))).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert!(err.is_concurrent_write_conflict());

        assert!(SessionRepository::find_active_in(&c, "m1", "op2").unwrap().is_none());
        assert_eq!(
            SessionRepository::find_active_by_machine_in(&c, "m1").unwrap().unwrap().session_id,
            "s1"
        );
    }

    #[test]
    fn test_close_only_once() {
        let conn = setup();
        let repo = SessionRepository::new(conn.clone());
        {
            let c = conn.lock().unwrap();
            SessionRepository::insert_in(&c, &session("s1", "m1", "op1", at(8, 0))).unwrap();
            assert!(SessionRepository::close_in(&c, "s1", at(16, 0)).unwrap());
            assert!(!SessionRepository::close_in(&c, "s1", at(17, 0)).unwrap());
        }
        let stored = repo.find_by_id("s1").unwrap().unwrap();
        assert!(!stored.active);
        assert_eq!(stored.ended_at, Some(at(16, 0)));
        assert!(repo.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_first_start_by_operator_within_day() {
        let conn = setup();
        let repo = SessionRepository::new(conn.clone());
        {
            let c = conn.lock().unwrap();
            SessionRepository::insert_in(&c, &session("s1", "m1", "op1", at(9, 30))).unwrap();
            SessionRepository::close_in(&c, "s1", at(10, 0)).unwrap();
            SessionRepository::insert_in(&c, &session("s2", "m2", "op1", at(7, 45))).unwrap();
        }
        let first = repo
            .find_first_start_by_operator("op1", at(0, 0), at(23, 59))
            .unwrap();
        assert_eq!(first, Some(at(7, 45)));
        assert_eq!(
            repo.find_first_start_by_operator("op9", at(0, 0), at(23, 59)).unwrap(),
            None
        );
    }

    #[test]
    fn test_overlapping_with_nominal_respects_scope() {
        let conn = setup();
        let repo = SessionRepository::new(conn.clone());
        {
            let c = conn.lock().unwrap();
            SessionRepository::insert_in(&c, &session("s1", "m1", "op1", at(8, 0))).unwrap();
            SessionRepository::insert_in(&c, &session("s2", "m2", "op2", at(8, 0))).unwrap();
        }
        let window = TimeWindow::new(at(9, 0), at(10, 0));

        let all = repo
            .list_overlapping_with_nominal(&ScopeFilter::default(), &window)
            .unwrap();
        assert_eq!(all.len(), 2);

        let only_op2 = ScopeFilter {
            operator_ids: vec!["op2".to_string()],
            ..Default::default()
        };
        let rows = repo.list_overlapping_with_nominal(&only_op2, &window).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.machine_id, "m2");
        assert_eq!(rows[0].1, 30.0);
    }
}
