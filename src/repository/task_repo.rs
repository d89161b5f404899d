// ==========================================
// 车间生产执行系统 - 任务片段数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 任务生命周期归 Task Registry 所有;
// 延续片段/链接只经由日结提交写入
// ==========================================

use crate::domain::program::DayReport;
use crate::domain::task::{ContinuationLink, TaskFragment};
use crate::domain::types::TaskState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// TaskRepository - 任务片段仓储
// ==========================================
pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    /// 创建新的TaskRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<TaskFragment> {
        let date_str: String = row.get("task_date")?;
        let state_str: String = row.get("state")?;
        let created_str: String = row.get("created_at")?;
        let updated_str: String = row.get("updated_at")?;

        Ok(TaskFragment {
            task_id: row.get("task_id")?,
            program_id: row.get("program_id")?,
            route_item_id: row.get("route_item_id")?,
            date: parse_date(&date_str)?,
            priority: row.get("priority")?,
            quantity_programmed: row.get("quantity_programmed")?,
            quantity_completed: row.get("quantity_completed")?,
            weight_programmed_kg: row.get("weight_programmed_kg")?,
            weight_completed_kg: row.get("weight_completed_kg")?,
            state: parse_state(&state_str)?,
            is_continuation: row.get("is_continuation")?,
            fragment_level: row.get("fragment_level")?,
            operator_id: row.get("operator_id")?,
            observations: row.get("observations")?,
            created_at: parse_datetime(&created_str)?,
            updated_at: parse_datetime(&updated_str)?,
        })
    }

    /// 插入任务片段
    pub fn insert(&self, task: &TaskFragment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_task(&conn, task)
    }

    /// 按task_id查询
    ///
    /// # 返回
    /// - `Ok(Some(TaskFragment))`: 找到任务
    /// - `Ok(None)`: 未找到
    pub fn find_by_id(&self, task_id: &str) -> RepositoryResult<Option<TaskFragment>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            "SELECT * FROM task_fragment WHERE task_id = ?",
            params![task_id],
            Self::map_row,
        ) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询某程序某天的任务列表 (按优先级升序)
    pub fn list_for_day(
        &self,
        program_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TaskFragment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT * FROM task_fragment
               WHERE program_id = ? AND task_date = ?
               ORDER BY priority ASC, task_id ASC"#,
        )?;

        let tasks = stmt
            .query_map(
                params![program_id, date.format(DATE_FMT).to_string()],
                Self::map_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// 查询某程序的全部任务 (按日期、优先级升序)
    pub fn list_for_program(&self, program_id: &str) -> RepositoryResult<Vec<TaskFragment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT * FROM task_fragment
               WHERE program_id = ?
               ORDER BY task_date ASC, priority ASC"#,
        )?;

        let tasks = stmt
            .query_map(params![program_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// 查询某程序某工艺路线项的任务 (按日期升序)
    pub fn list_for_route_item(
        &self,
        program_id: &str,
        route_item_id: &str,
    ) -> RepositoryResult<Vec<TaskFragment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT * FROM task_fragment
               WHERE program_id = ? AND route_item_id = ?
               ORDER BY task_date ASC"#,
        )?;

        let tasks = stmt
            .query_map(params![program_id, route_item_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// 批量插入任务片段 (单事务, 全有或全无)
    pub fn insert_many(&self, tasks: &[TaskFragment]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for task in tasks {
            insert_task(&tx, task)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    /// 批量改期 (单事务)
    ///
    /// 供重排应用使用; 每条建议对应一次调用,建议之间互相独立
    pub fn reschedule_tasks(
        &self,
        updates: &[(String, NaiveDate)],
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for (task_id, new_date) in updates {
            let affected = tx.execute(
                r#"UPDATE task_fragment
                   SET task_date = ?, updated_at = ?
                   WHERE task_id = ?"#,
                params![
                    new_date.format(DATE_FMT).to_string(),
                    now.format(DATETIME_FMT).to_string(),
                    task_id,
                ],
            )?;

            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "task_fragment".to_string(),
                    id: task_id.clone(),
                });
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    /// 更新生产上报字段
    ///
    /// 排产字段 (日期/数量计划/优先级) 不经此方法修改
    pub fn update_progress(&self, task: &TaskFragment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            r#"UPDATE task_fragment
               SET quantity_completed = ?, weight_completed_kg = ?, state = ?,
                   observations = ?, operator_id = ?, updated_at = ?
               WHERE task_id = ?"#,
            params![
                task.quantity_completed,
                task.weight_completed_kg,
                task.state.to_string(),
                &task.observations,
                &task.operator_id,
                task.updated_at.format(DATETIME_FMT).to_string(),
                &task.task_id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "task_fragment".to_string(),
                id: task.task_id.clone(),
            });
        }

        Ok(())
    }

    /// 原子地重排程序内任务优先级
    ///
    /// 按列表顺序赋 1..N; 任一任务不属于该程序则整体回滚,
    /// 部分重排对读取方永不可见
    pub fn reorder_priorities(
        &self,
        program_id: &str,
        ordered_task_ids: &[String],
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for (idx, task_id) in ordered_task_ids.iter().enumerate() {
            let affected = tx.execute(
                r#"UPDATE task_fragment
                   SET priority = ?, updated_at = ?
                   WHERE task_id = ? AND program_id = ?"#,
                params![
                    (idx + 1) as i32,
                    now.format(DATETIME_FMT).to_string(),
                    task_id,
                    program_id,
                ],
            )?;

            if affected == 0 {
                // 回滚整个事务,不留下部分重排
                return Err(RepositoryError::NotFound {
                    entity: "task_fragment".to_string(),
                    id: task_id.clone(),
                });
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    /// 日结提交 (全有或全无)
    ///
    /// 在单个事务内:
    /// 1. 检查 (program_id, date) 未日结, 否则 AlreadyFinalized
    /// 2. 插入全部延续片段与链接
    /// 3. 将各父任务置为 CONTINUED
    /// 4. 写入 FINALIZED 日结记录
    ///
    /// # 返回
    /// - `Err` 时任何延续都不会落库,日结记录不会写入;
    ///   错误信息包含导致中止的任务
    pub fn commit_finalization(
        &self,
        report: &DayReport,
        children: &[(TaskFragment, ContinuationLink)],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let date_str = report.report_date.format(DATE_FMT).to_string();

        // 终态检查在事务内执行,与写入原子
        let finalized: bool = tx
            .query_row(
                r#"SELECT 1 FROM day_report
                   WHERE program_id = ? AND report_date = ? AND state = 'FINALIZED'"#,
                params![&report.program_id, &date_str],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if finalized {
            return Err(RepositoryError::AlreadyFinalized {
                program_id: report.program_id.clone(),
                date: date_str,
            });
        }

        for (child, link) in children {
            insert_task(&tx, child).map_err(|e| wrap_abort(&link.parent_task_id, e))?;

            tx.execute(
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
            .map_err(|e| {
                map_link_error(
                    &link.parent_task_id,
                    &link.target_date.format(DATE_FMT).to_string(),
                    e,
                )
            })?;

            tx.execute(
                r#"UPDATE task_fragment SET state = ?, updated_at = ? WHERE task_id = ?"#,
                params![
                    TaskState::Continued.to_string(),
                    link.created_at.format(DATETIME_FMT).to_string(),
                    &link.parent_task_id,
                ],
            )
            .map_err(|e| wrap_abort(&link.parent_task_id, e.into()))?;
        }

        tx.execute(
            r#"INSERT INTO day_report (
                program_id, report_date, state, closed_by, closed_at, close_observations
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &report.program_id,
                &date_str,
                report.state.to_string(),
                &report.closed_by,
                report
                    .closed_at
                    .map(|dt| dt.format(DATETIME_FMT).to_string()),
                &report.close_observations,
            ],
        )
        .map_err(|e| match RepositoryError::from(e) {
            RepositoryError::UniqueConstraintViolation(_) => RepositoryError::AlreadyFinalized {
                program_id: report.program_id.clone(),
                date: report.report_date.format(DATE_FMT).to_string(),
            },
            other => other,
        })?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }
}

/// 在给定连接/事务上插入任务片段
fn insert_task(conn: &Connection, task: &TaskFragment) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT INTO task_fragment (
            task_id, program_id, route_item_id, task_date, priority,
            quantity_programmed, quantity_completed, weight_programmed_kg, weight_completed_kg,
            state, is_continuation, fragment_level, operator_id, observations,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &task.task_id,
            &task.program_id,
            &task.route_item_id,
            task.date.format(DATE_FMT).to_string(),
            task.priority,
            task.quantity_programmed,
            task.quantity_completed,
            task.weight_programmed_kg,
            task.weight_completed_kg,
            task.state.to_string(),
            task.is_continuation,
            task.fragment_level,
            &task.operator_id,
            &task.observations,
            task.created_at.format(DATETIME_FMT).to_string(),
            task.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;

    Ok(())
}

/// 将日结提交中途的错误包装为"哪个任务导致中止"
fn wrap_abort(parent_task_id: &str, err: RepositoryError) -> RepositoryError {
    RepositoryError::DatabaseTransactionError(format!(
        "日结提交中止于 parent_task_id={}: {}",
        parent_task_id, err
    ))
}

/// 延续链接唯一约束违反映射为 DuplicateLink
fn map_link_error(parent_task_id: &str, target_date: &str, err: rusqlite::Error) -> RepositoryError {
    match RepositoryError::from(err) {
        RepositoryError::UniqueConstraintViolation(_) => RepositoryError::DuplicateLink {
            parent_task_id: parent_task_id.to_string(),
            target_date: target_date.to_string(),
        },
        other => wrap_abort(parent_task_id, other),
    }
}

pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_datetime(s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_state(s: &str) -> rusqlite::Result<TaskState> {
    TaskState::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}
