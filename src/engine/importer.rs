// ==========================================
// 车间生产执行系统 - 工单导入引擎
// ==========================================
// 输入: CSV, 每行一个工艺路线项, 工单字段在首次出现时建档
// 行级校验: 坏行跳过并逐行记录错误, 不中止整批导入
// ==========================================

use crate::domain::route::{RouteItem, WorkOrder};
use crate::repository::{ProgramRepository, RepositoryResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// ==========================================
// 导入行与结果
// ==========================================

/// CSV 行格式
#[derive(Debug, Deserialize)]
struct RawRouteRow {
    order_code: String,
    product_description: String,
    target_quantity: f64,
    unit_weight_kg: Option<f64>,
    sequence: i32,
    process_code: String,
    process_description: String,
    machine_id: String,
    machine_code: String,
    standard_rate: f64,
    quantity: f64,
}

/// 行级错误
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// 导入结果
#[derive(Debug)]
pub struct ImportResult {
    pub imported_orders: usize,
    pub imported_route_items: usize,
    pub skipped_rows: usize,
    pub errors: Vec<RowError>,
}

// ==========================================
// WorkOrderImporter - 工单导入引擎
// ==========================================
pub struct WorkOrderImporter {
    program_repo: Arc<ProgramRepository>,
}

impl WorkOrderImporter {
    pub fn new(program_repo: Arc<ProgramRepository>) -> Self {
        Self { program_repo }
    }

    /// 从 CSV 导入工单及其工艺路线, 并挂入指定程序
    ///
    /// - 同一 order_code 多行共享一个工单, 首行建档
    /// - 已存在的工单直接复用 (按编号), 不重复建档
    /// - 行级错误收集到 ImportResult.errors, 不中止批次
    pub fn import_csv<R: Read>(
        &self,
        program_id: &str,
        reader: R,
    ) -> RepositoryResult<ImportResult> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        // order_code -> order_id, 含本批内复用的既有工单
        let mut known_orders: HashMap<String, String> = HashMap::new();
        let mut imported_orders = 0usize;
        let mut imported_route_items = 0usize;
        let mut errors: Vec<RowError> = Vec::new();

        for (idx, record) in csv_reader.deserialize::<RawRouteRow>().enumerate() {
            // 数据行从第 2 行开始 (第 1 行为表头)
            let line = idx + 2;

            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    errors.push(RowError {
                        line,
                        message: format!("解析失败: {}", e),
                    });
                    continue;
                }
            };

            if let Err(message) = validate_row(&row) {
                errors.push(RowError { line, message });
                continue;
            }

            let order_id = match known_orders.get(&row.order_code) {
                Some(id) => id.clone(),
                None => match self.resolve_order(program_id, &row) {
                    Ok((order_id, reused)) => {
                        if !reused {
                            imported_orders += 1;
                        }
                        known_orders.insert(row.order_code.clone(), order_id.clone());
                        order_id
                    }
                    Err(e) => {
                        errors.push(RowError {
                            line,
                            message: format!("工单建档失败: {}", e),
                        });
                        continue;
                    }
                },
            };

            let item = RouteItem {
                route_item_id: Uuid::new_v4().to_string(),
                order_id,
                sequence: row.sequence,
                process_code: row.process_code,
                process_description: row.process_description,
                machine_id: row.machine_id,
                machine_code: row.machine_code,
                standard_rate: row.standard_rate,
                quantity: row.quantity,
            };

            match self.program_repo.create_route_item(&item) {
                Ok(()) => imported_route_items += 1,
                Err(e) => errors.push(RowError {
                    line,
                    message: format!("路线项写入失败: {}", e),
                }),
            }
        }

        let skipped_rows = errors.len();

        info!(
            program_id = %program_id,
            imported_orders,
            imported_route_items,
            skipped_rows,
            "工单导入完成"
        );

        Ok(ImportResult {
            imported_orders,
            imported_route_items,
            skipped_rows,
            errors,
        })
    }

    /// 查找或创建工单并挂入程序
    ///
    /// # 返回
    /// - (order_id, 是否复用既有工单)
    fn resolve_order(
        &self,
        program_id: &str,
        row: &RawRouteRow,
    ) -> RepositoryResult<(String, bool)> {
        if let Some(existing) = self.program_repo.find_work_order_by_code(&row.order_code)? {
            return Ok((existing.order_id, true));
        }

        let order = WorkOrder {
            order_id: Uuid::new_v4().to_string(),
            order_code: row.order_code.clone(),
            product_description: row.product_description.clone(),
            target_quantity: row.target_quantity,
            unit_weight_kg: row.unit_weight_kg,
        };

        self.program_repo.create_work_order(&order)?;

        let priority = self.program_repo.next_priority(program_id)?;
        self.program_repo
            .attach_work_order(program_id, &order.order_id, priority)?;

        Ok((order.order_id, false))
    }
}

/// 行级校验
fn validate_row(row: &RawRouteRow) -> Result<(), String> {
    if row.order_code.is_empty() {
        return Err("工单编号为空".to_string());
    }
    if row.quantity <= 0.0 {
        return Err(format!("数量必须大于 0: {}", row.quantity));
    }
    if row.standard_rate <= 0.0 {
        return Err(format!("标准产率必须大于 0: {}", row.standard_rate));
    }
    if row.sequence <= 0 {
        return Err(format!("工序顺序必须大于 0: {}", row.sequence));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_row_rejects_bad_rate() {
        let row = RawRouteRow {
            order_code: "OT1".to_string(),
            product_description: "试制件".to_string(),
            target_quantity: 10.0,
            unit_weight_kg: Some(1.0),
            sequence: 1,
            process_code: "CORTE".to_string(),
            process_description: "切割".to_string(),
            machine_id: "M1".to_string(),
            machine_code: "M1".to_string(),
            standard_rate: 0.0,
            quantity: 10.0,
        };

        assert!(validate_row(&row).is_err());
    }
}
