// ==========================================
// 车间生产执行系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduling_config_trait::SchedulingConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use chrono::NaiveTime;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 配置键全集
pub mod config_keys {
    pub const WORKDAY_START: &str = "calendar.workday_start";
    pub const WORKDAY_END: &str = "calendar.workday_end";
    pub const FRIDAY_END: &str = "calendar.friday_end";
    pub const BREAK_START: &str = "calendar.break_start";
    pub const BREAK_END: &str = "calendar.break_end";
    pub const SETUP_MINUTES: &str = "machine.setup_minutes";
}

const TIME_FMT: &str = "%H:%M";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（INSERT OR REPLACE）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')"#,
            params![key, value],
        )?;

        Ok(())
    }

    /// 读取时间型配置（缺失时返回默认值）
    fn get_time_or(&self, key: &str, default: &str) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
        let raw = self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string());

        NaiveTime::parse_from_str(&raw, TIME_FMT)
            .map_err(|e| format!("配置 {} 的值 {} 无法解析为时间: {}", key, raw, e).into())
    }

    /// 读取整数型配置（缺失时返回默认值）
    fn get_i64_or(&self, key: &str, default: i64) -> Result<i64, Box<dyn Error + Send + Sync>> {
        match self.get_config_value(key)? {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|e| format!("配置 {} 的值 {} 无法解析为整数: {}", key, raw, e).into()),
            None => Ok(default),
        }
    }
}

#[async_trait]
impl SchedulingConfigReader for ConfigManager {
    async fn get_workday_start(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
        self.get_time_or(config_keys::WORKDAY_START, "07:45")
    }

    async fn get_workday_end(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
        self.get_time_or(config_keys::WORKDAY_END, "17:45")
    }

    async fn get_friday_end(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
        self.get_time_or(config_keys::FRIDAY_END, "16:45")
    }

    async fn get_break_start(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
        self.get_time_or(config_keys::BREAK_START, "13:00")
    }

    async fn get_break_end(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
        self.get_time_or(config_keys::BREAK_END, "14:00")
    }

    async fn get_setup_minutes(&self) -> Result<i64, Box<dyn Error + Send + Sync>> {
        self.get_i64_or(config_keys::SETUP_MINUTES, 30)
    }
}
