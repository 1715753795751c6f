// ==========================================
// 生产台账引擎 - 机台/模具数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: `*_in` 关联函数接收 &Connection，供引擎在同一事务内组合调用
// ==========================================

use crate::db::{format_ts, parse_enum};
use crate::domain::machine::{Machine, Matrix};
use crate::domain::types::{MachineStatus, MatrixStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const MACHINE_COLUMNS: &str = r#"
    machine_id, company_id, group_id, code,
    matrix_count, nominal_cycle_seconds, status, current_operator_id
"#;

// ==========================================
// MachineRepository - 机台仓储
// ==========================================
pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 机台
    // ==========================================

    pub fn insert_in(conn: &Connection, machine: &Machine, now: NaiveDateTime) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO machine (
                machine_id, company_id, group_id, code,
                matrix_count, nominal_cycle_seconds, status, current_operator_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                machine.machine_id,
                machine.company_id,
                machine.group_id,
                machine.code,
                machine.matrix_count,
                machine.nominal_cycle_seconds,
                machine.status.as_str(),
                machine.current_operator_id,
                format_ts(now),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, machine_id: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, machine_id)
    }

    pub fn find_by_id_in(conn: &Connection, machine_id: &str) -> RepositoryResult<Option<Machine>> {
        let sql = format!("SELECT {} FROM machine WHERE machine_id = ?1", MACHINE_COLUMNS);
        let machine = conn
            .query_row(&sql, params![machine_id], map_machine)
            .optional()?;
        Ok(machine)
    }

    /// 更新机台状态与当前操作员
    pub fn update_status_in(
        conn: &Connection,
        machine_id: &str,
        status: MachineStatus,
        operator_id: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE machine
            SET status = ?1, current_operator_id = ?2, updated_at = ?3
            WHERE machine_id = ?4
            "#,
            params![status.as_str(), operator_id, format_ts(now), machine_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Machine", machine_id));
        }
        Ok(())
    }

    pub fn update_matrix_count_in(
        conn: &Connection,
        machine_id: &str,
        matrix_count: i32,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE machine SET matrix_count = ?1, updated_at = ?2 WHERE machine_id = ?3",
            params![matrix_count, format_ts(now), machine_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Machine", machine_id));
        }
        Ok(())
    }

    // ==========================================
    // 模具
    // ==========================================

    pub fn insert_matrix_in(conn: &Connection, matrix: &Matrix) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO matrix (matrix_id, machine_id, matrix_number, status)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                matrix.matrix_id,
                matrix.machine_id,
                matrix.matrix_number,
                matrix.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn list_matrices(&self, machine_id: &str) -> RepositoryResult<Vec<Matrix>> {
        let conn = self.get_conn()?;
        Self::list_matrices_in(&conn, machine_id)
    }

    pub fn list_matrices_in(conn: &Connection, machine_id: &str) -> RepositoryResult<Vec<Matrix>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT matrix_id, machine_id, matrix_number, status
            FROM matrix
            WHERE machine_id = ?1
            ORDER BY matrix_number ASC
            "#,
        )?;
        let matrices = stmt
            .query_map(params![machine_id], map_matrix)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(matrices)
    }

    pub fn find_matrix_by_number_in(
        conn: &Connection,
        machine_id: &str,
        matrix_number: i32,
    ) -> RepositoryResult<Option<Matrix>> {
        let matrix = conn
            .query_row(
                r#"
                SELECT matrix_id, machine_id, matrix_number, status
                FROM matrix
                WHERE machine_id = ?1 AND matrix_number = ?2
                "#,
                params![machine_id, matrix_number],
                map_matrix,
            )
            .optional()?;
        Ok(matrix)
    }

    pub fn find_matrix_by_id_in(conn: &Connection, matrix_id: &str) -> RepositoryResult<Option<Matrix>> {
        let matrix = conn
            .query_row(
                r#"
                SELECT matrix_id, machine_id, matrix_number, status
                FROM matrix
                WHERE matrix_id = ?1
                "#,
                params![matrix_id],
                map_matrix,
            )
            .optional()?;
        Ok(matrix)
    }

    pub fn update_matrix_status_in(
        conn: &Connection,
        matrix_id: &str,
        status: MatrixStatus,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE matrix SET status = ?1 WHERE matrix_id = ?2",
            params![status.as_str(), matrix_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Matrix", matrix_id));
        }
        Ok(())
    }

    /// 将机台下所有模具重置为指定状态
    pub fn reset_matrices_in(
        conn: &Connection,
        machine_id: &str,
        status: MatrixStatus,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "UPDATE matrix SET status = ?1 WHERE machine_id = ?2",
            params![status.as_str(), machine_id],
        )?;
        Ok(rows)
    }

    /// 删除序号大于 max_number 的模具
    pub fn delete_matrices_above_in(
        conn: &Connection,
        machine_id: &str,
        max_number: i32,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "DELETE FROM matrix WHERE machine_id = ?1 AND matrix_number > ?2",
            params![machine_id, max_number],
        )?;
        Ok(rows)
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_machine(row: &Row<'_>) -> SqliteResult<Machine> {
    let status: String = row.get(6)?;
    Ok(Machine {
        machine_id: row.get(0)?,
        company_id: row.get(1)?,
        group_id: row.get(2)?,
        code: row.get(3)?,
        matrix_count: row.get(4)?,
        nominal_cycle_seconds: row.get(5)?,
        status: parse_enum(6, &status, MachineStatus::parse)?,
        current_operator_id: row.get(7)?,
    })
}

fn map_matrix(row: &Row<'_>) -> SqliteResult<Matrix> {
    let status: String = row.get(3)?;
    Ok(Matrix {
        matrix_id: row.get(0)?,
        machine_id: row.get(1)?,
        matrix_number: row.get(2)?,
        status: parse_enum(3, &status, MatrixStatus::parse)?,
    })
}
