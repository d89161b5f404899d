// ==========================================
// 车间生产执行系统 - 重排建议领域模型
// ==========================================
// 建议为即时计算结果,不落库; 仅在人工确认后应用
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// AdjustmentSuggestion - 单条重排建议
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentSuggestion {
    pub order_code: String,              // 工单编号
    pub route_item_id: String,           // 工艺路线项
    pub process_code: String,            // 工序代码
    pub process_description: String,     // 工序描述
    pub machine_id: String,              // 机台ID
    pub machine_code: String,            // 机台代码
    pub original_start: NaiveDateTime,   // 原计划开始
    pub proposed_start: NaiveDateTime,   // 建议开始
}

// ==========================================
// AdjustmentReport - 检查结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub program_id: String,
    pub requires_adjustment: bool,
    pub current_end_date: Option<NaiveDate>,   // 程序当前结束日期
    pub proposed_end_date: Option<NaiveDate>,  // 应用建议后的结束日期
    pub suggestions: Vec<AdjustmentSuggestion>,
}

// ==========================================
// 应用结果 - 每条建议独立提交,逐条上报结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub route_item_id: String,
    pub applied: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentApplyResult {
    pub program_id: String,
    pub applied_count: usize,
    pub failed_count: usize,
    pub outcomes: Vec<AdjustmentOutcome>,
}

impl AdjustmentApplyResult {
    /// 是否存在部分失败
    pub fn is_partial_failure(&self) -> bool {
        self.failed_count > 0 && self.applied_count > 0
    }
}
