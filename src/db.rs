// ==========================================
// 生产台账引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/busy_timeout）
// - 幂等建表；台账核心约束同时由部分唯一索引兜底
// - 统一时间戳存储格式
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式（本地时间，精确到秒，字典序即时间序）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 进程内共享连接
pub type SharedConnection = Arc<Mutex<Connection>>;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接、建表，并包装为共享连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<SharedConnection> {
    let mut conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(Arc::new(Mutex::new(conn)))
}

/// 内存库（测试用），已建表
pub fn open_in_memory_shared() -> rusqlite::Result<SharedConnection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 幂等建表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS machine (
            machine_id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            group_id TEXT,
            code TEXT NOT NULL,
            matrix_count INTEGER NOT NULL DEFAULT 0 CHECK (matrix_count >= 0),
            nominal_cycle_seconds REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'IDLE'
                CHECK (status IN ('IDLE', 'RUNNING', 'STOPPED', 'EMERGENCY')),
            current_operator_id TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS matrix (
            matrix_id TEXT PRIMARY KEY,
            machine_id TEXT NOT NULL REFERENCES machine(machine_id) ON DELETE CASCADE,
            matrix_number INTEGER NOT NULL CHECK (matrix_number >= 1),
            status TEXT NOT NULL DEFAULT 'RUNNING'
                CHECK (status IN ('RUNNING', 'STOPPED')),
            UNIQUE (machine_id, matrix_number)
        );

        CREATE TABLE IF NOT EXISTS production_session (
            session_id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            machine_id TEXT NOT NULL REFERENCES machine(machine_id),
            operator_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            active INTEGER NOT NULL DEFAULT 1
        );

        -- 一台机台同一时刻只能被一个会话独占
        CREATE UNIQUE INDEX IF NOT EXISTS ux_session_active_machine
          ON production_session(machine_id) WHERE active = 1;

        CREATE INDEX IF NOT EXISTS idx_session_operator
          ON production_session(operator_id, started_at);

        CREATE TABLE IF NOT EXISTS stop_reason (
            stop_reason_id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            exclude_from_pareto INTEGER NOT NULL DEFAULT 0,
            is_system INTEGER NOT NULL DEFAULT 0,
            UNIQUE (company_id, name)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_stop_reason_system
          ON stop_reason(company_id) WHERE is_system = 1;

        CREATE TABLE IF NOT EXISTS time_log (
            time_log_id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            session_id TEXT NOT NULL REFERENCES production_session(session_id),
            machine_id TEXT NOT NULL REFERENCES machine(machine_id),
            matrix_id TEXT,
            matrix_number INTEGER,
            operator_id TEXT NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('IDLE', 'RUNNING', 'STOPPED', 'EMERGENCY')),
            stop_reason_id TEXT REFERENCES stop_reason(stop_reason_id),
            started_at TEXT NOT NULL,
            ended_at TEXT,
            duration_seconds INTEGER
        );

        -- 台账核心约束: 每个 (会话, 机台, 模具/整机) 至多一个未关闭区间
        CREATE UNIQUE INDEX IF NOT EXISTS ux_time_log_open_key
          ON time_log(session_id, machine_id, IFNULL(matrix_id, ''))
          WHERE ended_at IS NULL;

        CREATE INDEX IF NOT EXISTS idx_time_log_machine_time
          ON time_log(machine_id, started_at);

        CREATE INDEX IF NOT EXISTS idx_time_log_open
          ON time_log(ended_at, started_at);

        CREATE TABLE IF NOT EXISTS cycle_log (
            cycle_log_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES production_session(session_id),
            machine_id TEXT NOT NULL REFERENCES machine(machine_id),
            matrix_id TEXT,
            operator_id TEXT NOT NULL,
            completed_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cycle_log_machine_time
          ON cycle_log(machine_id, completed_at);

        CREATE TABLE IF NOT EXISTS operator_group_member (
            operator_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            PRIMARY KEY (operator_id, group_id)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            company_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            machine_id TEXT,
            session_id TEXT,
            payload_json TEXT,
            detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_machine_ts
          ON action_log(machine_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 时间戳读写
// ==========================================

pub fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 解析时间戳列（行映射闭包内使用，错误转为 rusqlite 转换错误）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// 解析枚举列（未知取值视为数据损坏）
pub fn parse_enum<T>(idx: usize, raw: &str, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("未知枚举值: {}", raw).into(),
        )
    })
}
