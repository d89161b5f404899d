// ==========================================
// 车间生产执行系统 - 生产程序数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 包含: 程序、工单、工艺路线、日结记录四个仓储
// ==========================================

use crate::domain::program::{DayReport, ProductionProgram};
use crate::domain::route::{RouteItem, WorkOrder};
use crate::domain::types::DayReportState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::task_repo::{parse_date, parse_datetime};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ProgramRepository - 生产程序仓储
// ==========================================
pub struct ProgramRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProgramRepository {
    /// 创建新的ProgramRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_program(row: &Row) -> rusqlite::Result<ProductionProgram> {
        let start_str: String = row.get("start_date")?;
        let end_str: Option<String> = row.get("end_date")?;
        let created_str: String = row.get("created_at")?;
        let updated_str: String = row.get("updated_at")?;

        Ok(ProductionProgram {
            program_id: row.get("program_id")?,
            program_name: row.get("program_name")?,
            start_date: parse_date(&start_str)?,
            end_date: end_str.as_deref().map(parse_date).transpose()?,
            created_by: row.get("created_by")?,
            created_at: parse_datetime(&created_str)?,
            updated_at: parse_datetime(&updated_str)?,
        })
    }

    /// 创建生产程序
    pub fn create(&self, program: &ProductionProgram) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO production_program (
                program_id, program_name, start_date, end_date,
                created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &program.program_id,
                &program.program_name,
                program.start_date.format(DATE_FMT).to_string(),
                program.end_date.map(|d| d.format(DATE_FMT).to_string()),
                &program.created_by,
                program.created_at.format(DATETIME_FMT).to_string(),
                program.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;

        Ok(program.program_id.clone())
    }

    /// 按program_id查询
    pub fn find_by_id(&self, program_id: &str) -> RepositoryResult<Option<ProductionProgram>> {
        let conn = self.get_conn()?;

        let program = conn
            .query_row(
                "SELECT * FROM production_program WHERE program_id = ?",
                params![program_id],
                Self::map_program,
            )
            .optional()?;

        Ok(program)
    }

    /// 查询所有程序 (按创建时间降序)
    pub fn list_all(&self) -> RepositoryResult<Vec<ProductionProgram>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT * FROM production_program ORDER BY created_at DESC",
        )?;

        let programs = stmt
            .query_map([], Self::map_program)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(programs)
    }

    /// 更新程序结束日期
    pub fn update_end_date(
        &self,
        program_id: &str,
        end_date: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            r#"UPDATE production_program
               SET end_date = ?, updated_at = ?
               WHERE program_id = ?"#,
            params![
                end_date.map(|d| d.format(DATE_FMT).to_string()),
                now.format(DATETIME_FMT).to_string(),
                program_id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "production_program".to_string(),
                id: program_id.to_string(),
            });
        }

        Ok(())
    }

    /// 创建工单
    pub fn create_work_order(&self, order: &WorkOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO work_order (
                order_id, order_code, product_description, target_quantity, unit_weight_kg
            ) VALUES (?, ?, ?, ?, ?)"#,
            params![
                &order.order_id,
                &order.order_code,
                &order.product_description,
                order.target_quantity,
                order.unit_weight_kg,
            ],
        )?;

        Ok(())
    }

    /// 按order_id查询工单
    pub fn find_work_order(&self, order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;

        let order = conn
            .query_row(
                "SELECT * FROM work_order WHERE order_id = ?",
                params![order_id],
                Self::map_work_order,
            )
            .optional()?;

        Ok(order)
    }

    /// 按工单编号查询工单
    pub fn find_work_order_by_code(&self, order_code: &str) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;

        let order = conn
            .query_row(
                "SELECT * FROM work_order WHERE order_code = ?",
                params![order_code],
                Self::map_work_order,
            )
            .optional()?;

        Ok(order)
    }

    fn map_work_order(row: &Row) -> rusqlite::Result<WorkOrder> {
        Ok(WorkOrder {
            order_id: row.get("order_id")?,
            order_code: row.get("order_code")?,
            product_description: row.get("product_description")?,
            target_quantity: row.get("target_quantity")?,
            unit_weight_kg: row.get("unit_weight_kg")?,
        })
    }

    /// 将工单挂入程序
    pub fn attach_work_order(
        &self,
        program_id: &str,
        order_id: &str,
        priority: i32,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO program_work_order (program_id, order_id, priority)
               VALUES (?, ?, ?)"#,
            params![program_id, order_id, priority],
        )?;

        Ok(())
    }

    /// 查询程序内工单 (按优先级升序, 附带优先级)
    pub fn list_work_orders(
        &self,
        program_id: &str,
    ) -> RepositoryResult<Vec<(WorkOrder, i32)>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT w.*, p.priority AS program_priority
               FROM work_order w
               JOIN program_work_order p ON p.order_id = w.order_id
               WHERE p.program_id = ?
               ORDER BY p.priority ASC"#,
        )?;

        let orders = stmt
            .query_map(params![program_id], |row| {
                let order = Self::map_work_order(row)?;
                let priority: i32 = row.get("program_priority")?;
                Ok((order, priority))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(orders)
    }

    /// 程序内下一个可用优先级 (现有最大值 + 1)
    pub fn next_priority(&self, program_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let max: Option<i32> = conn.query_row(
            "SELECT MAX(priority) FROM program_work_order WHERE program_id = ?",
            params![program_id],
            |row| row.get(0),
        )?;

        Ok(max.unwrap_or(0) + 1)
    }

    /// 创建工艺路线项
    pub fn create_route_item(&self, item: &RouteItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO route_item (
                route_item_id, order_id, sequence, process_code, process_description,
                machine_id, machine_code, standard_rate, quantity
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &item.route_item_id,
                &item.order_id,
                item.sequence,
                &item.process_code,
                &item.process_description,
                &item.machine_id,
                &item.machine_code,
                item.standard_rate,
                item.quantity,
            ],
        )?;

        Ok(())
    }

    fn map_route_item(row: &Row) -> rusqlite::Result<RouteItem> {
        Ok(RouteItem {
            route_item_id: row.get("route_item_id")?,
            order_id: row.get("order_id")?,
            sequence: row.get("sequence")?,
            process_code: row.get("process_code")?,
            process_description: row.get("process_description")?,
            machine_id: row.get("machine_id")?,
            machine_code: row.get("machine_code")?,
            standard_rate: row.get("standard_rate")?,
            quantity: row.get("quantity")?,
        })
    }

    /// 按route_item_id查询
    pub fn find_route_item(&self, route_item_id: &str) -> RepositoryResult<Option<RouteItem>> {
        let conn = self.get_conn()?;

        let item = conn
            .query_row(
                "SELECT * FROM route_item WHERE route_item_id = ?",
                params![route_item_id],
                Self::map_route_item,
            )
            .optional()?;

        Ok(item)
    }

    /// 部分更新工艺路线项 (机台/标准产率)
    ///
    /// None 字段保持原值
    pub fn update_route_item(
        &self,
        route_item_id: &str,
        machine_id: Option<&str>,
        machine_code: Option<&str>,
        standard_rate: Option<f64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            r#"UPDATE route_item
               SET machine_id = COALESCE(?, machine_id),
                   machine_code = COALESCE(?, machine_code),
                   standard_rate = COALESCE(?, standard_rate)
               WHERE route_item_id = ?"#,
            params![machine_id, machine_code, standard_rate, route_item_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "route_item".to_string(),
                id: route_item_id.to_string(),
            });
        }

        Ok(())
    }

    /// 查询工单的工艺路线 (按工序顺序升序)
    pub fn list_route_items_for_order(&self, order_id: &str) -> RepositoryResult<Vec<RouteItem>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT * FROM route_item WHERE order_id = ? ORDER BY sequence ASC",
        )?;

        let items = stmt
            .query_map(params![order_id], Self::map_route_item)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// 删除程序的全部任务片段与日结记录 (重新生成前的清理)
    ///
    /// 单事务执行; 延续链接随任务级联删除
    pub fn delete_fragments_and_reports(&self, program_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            "DELETE FROM task_fragment WHERE program_id = ?",
            params![program_id],
        )?;
        tx.execute(
            "DELETE FROM day_report WHERE program_id = ?",
            params![program_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }
}

// ==========================================
// DayReportRepository - 日结记录仓储
// ==========================================
pub struct DayReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DayReportRepository {
    /// 创建新的DayReportRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<DayReport> {
        let date_str: String = row.get("report_date")?;
        let state_str: String = row.get("state")?;
        let closed_str: Option<String> = row.get("closed_at")?;

        let state = DayReportState::from_str(&state_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(DayReport {
            program_id: row.get("program_id")?,
            report_date: parse_date(&date_str)?,
            state,
            closed_by: row.get("closed_by")?,
            closed_at: closed_str.as_deref().map(parse_datetime).transpose()?,
            close_observations: row.get("close_observations")?,
        })
    }

    /// 查询日结记录
    pub fn find(
        &self,
        program_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<DayReport>> {
        let conn = self.get_conn()?;

        let report = conn
            .query_row(
                "SELECT * FROM day_report WHERE program_id = ? AND report_date = ?",
                params![program_id, date.format(DATE_FMT).to_string()],
                Self::map_row,
            )
            .optional()?;

        Ok(report)
    }

    /// 判断某天是否已日结
    pub fn is_finalized(&self, program_id: &str, date: NaiveDate) -> RepositoryResult<bool> {
        Ok(self
            .find(program_id, date)?
            .map(|r| r.state == DayReportState::Finalized)
            .unwrap_or(false))
    }
}
