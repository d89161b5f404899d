// ==========================================
// 车间生产执行系统 - 工单与工艺路线领域模型
// ==========================================
// 工单拥有按顺序排列的工艺路线项 (工序+机台+标准工时)
// 任务片段引用工艺路线项
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// WorkOrder - 工单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub order_id: String,               // 工单ID
    pub order_code: String,             // 工单编号 (唯一)
    pub product_description: String,    // 产品描述
    pub target_quantity: f64,           // 目标数量
    pub unit_weight_kg: Option<f64>,    // 单件重量 (kg)
}

// ==========================================
// RouteItem - 工艺路线项
// ==========================================
// (order_id, sequence) 唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteItem {
    pub route_item_id: String,          // 路线项ID
    pub order_id: String,               // 所属工单
    pub sequence: i32,                  // 工序顺序
    pub process_code: String,           // 工序代码
    pub process_description: String,    // 工序描述
    pub machine_id: String,             // 机台ID
    pub machine_code: String,           // 机台代码
    pub standard_rate: f64,             // 标准产率 (件/小时)
    pub quantity: f64,                  // 该工序计划数量
}

impl RouteItem {
    /// 按标准产率估算所需纯工时 (小时)
    ///
    /// standard_rate <= 0 返回 None (数据质量问题由调用方上报)
    pub fn estimated_hours(&self) -> Option<f64> {
        if self.standard_rate > 0.0 {
            Some(self.quantity / self.standard_rate)
        } else {
            None
        }
    }
}
