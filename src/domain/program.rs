// ==========================================
// 车间生产执行系统 - 生产程序领域模型
// ==========================================

use crate::domain::types::DayReportState;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionProgram - 生产程序
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionProgram {
    pub program_id: String,            // 程序ID
    pub program_name: String,          // 程序名称
    pub start_date: NaiveDate,         // 开始日期
    pub end_date: Option<NaiveDate>,   // 结束日期 (由排程计算)
    pub created_by: String,            // 创建人
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// DayReport - 日结记录
// ==========================================
// (program_id, report_date) 唯一; FINALIZED 不可回退
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayReport {
    pub program_id: String,
    pub report_date: NaiveDate,
    pub state: DayReportState,
    pub closed_by: Option<String>,
    pub closed_at: Option<NaiveDateTime>,
    pub close_observations: String,
}

// ==========================================
// DailySummary - 当日汇总
// ==========================================
// 供监督报表使用的只读聚合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub program_id: String,
    pub date: NaiveDate,
    pub task_count: usize,
    pub completed_count: usize,
    pub total_quantity_programmed: f64,
    pub total_quantity_completed: f64,
    pub percent_complete: f64, // 完成任务数占比 (%)
    pub finalized: bool,
}
