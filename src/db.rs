// ==========================================
// 车间生产执行系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供统一建库入口（schema bootstrap）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
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

/// 初始化数据库 schema（幂等）
///
/// 所有表使用 IF NOT EXISTS，可对已有库安全地重复执行
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS production_program (
            program_id TEXT PRIMARY KEY,
            program_name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS work_order (
            order_id TEXT PRIMARY KEY,
            order_code TEXT NOT NULL UNIQUE,
            product_description TEXT NOT NULL,
            target_quantity REAL NOT NULL,
            unit_weight_kg REAL
        );

        CREATE TABLE IF NOT EXISTS program_work_order (
            program_id TEXT NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            order_id TEXT NOT NULL REFERENCES work_order(order_id) ON DELETE CASCADE,
            priority INTEGER NOT NULL,
            PRIMARY KEY (program_id, order_id)
        );

        CREATE TABLE IF NOT EXISTS route_item (
            route_item_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES work_order(order_id) ON DELETE CASCADE,
            sequence INTEGER NOT NULL,
            process_code TEXT NOT NULL,
            process_description TEXT NOT NULL,
            machine_id TEXT NOT NULL,
            machine_code TEXT NOT NULL,
            standard_rate REAL NOT NULL,
            quantity REAL NOT NULL,
            UNIQUE(order_id, sequence)
        );

        CREATE TABLE IF NOT EXISTS task_fragment (
            task_id TEXT PRIMARY KEY,
            program_id TEXT NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            route_item_id TEXT NOT NULL REFERENCES route_item(route_item_id) ON DELETE CASCADE,
            task_date TEXT NOT NULL,
            priority INTEGER NOT NULL,
            quantity_programmed REAL NOT NULL,
            quantity_completed REAL NOT NULL DEFAULT 0,
            weight_programmed_kg REAL NOT NULL DEFAULT 0,
            weight_completed_kg REAL,
            state TEXT NOT NULL,
            is_continuation INTEGER NOT NULL DEFAULT 0,
            fragment_level INTEGER NOT NULL DEFAULT 0,
            operator_id TEXT,
            observations TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(program_id, route_item_id, task_date)
        );

        CREATE INDEX IF NOT EXISTS idx_task_fragment_program_date
            ON task_fragment(program_id, task_date);

        CREATE TABLE IF NOT EXISTS continuation_link (
            parent_task_id TEXT NOT NULL REFERENCES task_fragment(task_id) ON DELETE CASCADE,
            child_task_id TEXT NOT NULL UNIQUE REFERENCES task_fragment(task_id) ON DELETE CASCADE,
            carried_quantity REAL NOT NULL,
            carried_weight_kg REAL NOT NULL,
            percent_complete_at_split REAL NOT NULL,
            target_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (parent_task_id, child_task_id),
            UNIQUE(parent_task_id, target_date)
        );

        CREATE TABLE IF NOT EXISTS day_report (
            program_id TEXT NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            report_date TEXT NOT NULL,
            state TEXT NOT NULL,
            closed_by TEXT,
            closed_at TEXT,
            close_observations TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (program_id, report_date)
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}
