// ==========================================
// 车间生产执行系统 - 延续链接数据仓储
// ==========================================
// 只追加结构: 链接一经写入不更新、不删除
// 不变式由表约束兜底:
// - child_task_id 唯一 (一个任务至多一个父)
// - (parent_task_id, target_date) 唯一 (同一父同一天至多一个子)
// ==========================================

use crate::domain::task::ContinuationLink;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::task_repo::{parse_date, parse_datetime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ContinuationLinkRepository - 延续链接仓储
// ==========================================
pub struct ContinuationLinkRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ContinuationLinkRepository {
    /// 创建新的ContinuationLinkRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<ContinuationLink> {
        let target_date_str: String = row.get("target_date")?;
        let created_str: String = row.get("created_at")?;

        Ok(ContinuationLink {
            parent_task_id: row.get("parent_task_id")?,
            child_task_id: row.get("child_task_id")?,
            carried_quantity: row.get("carried_quantity")?,
            carried_weight_kg: row.get("carried_weight_kg")?,
            percent_complete_at_split: row.get("percent_complete_at_split")?,
            target_date: parse_date(&target_date_str)?,
            created_at: parse_datetime(&created_str)?,
        })
    }

    /// 追加延续链接
    ///
    /// # 返回
    /// - `Err(DuplicateLink)`: 该父任务当天已有延续 (内部不变式被破坏的信号)
    pub fn record_link(&self, link: &ContinuationLink) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO continuation_link (
                parent_task_id, child_task_id, carried_quantity, carried_weight_kg,
                percent_complete_at_split, target_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &link.parent_task_id,
                &link.child_task_id,
                link.carried_quantity,
                link.carried_weight_kg,
                link.percent_complete_at_split,
                link.target_date.format(DATE_FMT).to_string(),
                link.created_at.format(DATETIME_FMT).to_string(),
            ],
        )
        .map_err(|e| match RepositoryError::from(e) {
            RepositoryError::UniqueConstraintViolation(_) => RepositoryError::DuplicateLink {
                parent_task_id: link.parent_task_id.clone(),
                target_date: link.target_date.format(DATE_FMT).to_string(),
            },
            other => other,
        })?;

        Ok(())
    }

    /// 查询某任务的直接子链接 (按目标日期升序)
    pub fn children_of(&self, parent_task_id: &str) -> RepositoryResult<Vec<ContinuationLink>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT * FROM continuation_link
               WHERE parent_task_id = ?
               ORDER BY target_date ASC"#,
        )?;

        let links = stmt
            .query_map(params![parent_task_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    /// 查询某任务的父链接
    ///
    /// # 返回
    /// - `Ok(None)`: 该任务是原始片段 (无父)
    pub fn parent_of(&self, child_task_id: &str) -> RepositoryResult<Option<ContinuationLink>> {
        let conn = self.get_conn()?;

        let link = conn
            .query_row(
                "SELECT * FROM continuation_link WHERE child_task_id = ?",
                params![child_task_id],
                Self::map_row,
            )
            .optional()?;

        Ok(link)
    }
}
