// ==========================================
// 车间生产执行系统 - 任务片段领域模型
// ==========================================
// 核心实体: 某工序在某天的生产任务
// 一个未完成任务在日结时生成"延续片段",形成谱系树
// ==========================================

use crate::domain::types::TaskState;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// TaskFragment - 任务片段
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFragment {
    pub task_id: String,                   // 任务ID
    pub program_id: String,                // 所属生产程序
    pub route_item_id: String,             // 工艺路线项 (工序+机台+顺序)
    pub date: NaiveDate,                   // 计划日期
    pub priority: i32,                     // 程序内优先级 (1..N)
    pub quantity_programmed: f64,          // 计划数量
    pub quantity_completed: f64,           // 完成数量
    pub weight_programmed_kg: f64,         // 计划重量 (kg)
    pub weight_completed_kg: Option<f64>,  // 完成重量 (kg, 未上报为 None)
    pub state: TaskState,                  // 任务状态
    pub is_continuation: bool,             // 是否为延续片段
    pub fragment_level: i32,               // 谱系深度 (原始任务为 0)
    pub operator_id: Option<String>,       // 操作工 (按日指派,不随延续继承)
    pub observations: String,              // 备注
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TaskFragment {
    /// 待延续数量 (完成超报时下限钳制为 0)
    pub fn quantity_pending(&self) -> f64 {
        (self.quantity_programmed - self.quantity_completed).max(0.0)
    }

    /// 待延续重量 (kg)
    pub fn weight_pending_kg(&self) -> f64 {
        (self.weight_programmed_kg - self.weight_completed_kg.unwrap_or(0.0)).max(0.0)
    }

    /// 本片段完成率 (%)
    pub fn percent_complete(&self) -> f64 {
        if self.quantity_programmed > 0.0 {
            self.quantity_completed / self.quantity_programmed * 100.0
        } else {
            0.0
        }
    }
}

// ==========================================
// TaskPatch - 任务部分更新
// ==========================================
// 仅允许更新生产上报相关字段,排产字段由引擎维护
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub quantity_completed: Option<f64>,
    pub weight_completed_kg: Option<f64>,
    pub state: Option<TaskState>,
    pub observations: Option<String>,
    pub operator_id: Option<Option<String>>, // Some(None) 表示清除指派
}

impl TaskPatch {
    /// 补丁是否为空
    pub fn is_empty(&self) -> bool {
        self.quantity_completed.is_none()
            && self.weight_completed_kg.is_none()
            && self.state.is_none()
            && self.observations.is_none()
            && self.operator_id.is_none()
    }
}

// ==========================================
// ContinuationPlan - 延续计划 (纯计算结果)
// ==========================================
// compute_continuation 的输出,未落库前仅存在于内存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationPlan {
    pub parent_task_id: String,
    pub program_id: String,
    pub route_item_id: String,
    pub priority: i32,
    pub target_date: NaiveDate,           // 由编排器解析为工作日后传入
    pub carried_quantity: f64,            // 结转数量
    pub carried_weight_kg: f64,           // 结转重量
    pub percent_complete_at_split: f64,   // 拆分时父任务完成率
    pub fragment_level: i32,              // 子片段深度 (父 + 1)
}

// ==========================================
// ContinuationLink - 延续链接 (父→子)
// ==========================================
// 不变式: 一个任务至多一个父; 同一父同一天至多一个子
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationLink {
    pub parent_task_id: String,
    pub child_task_id: String,
    pub carried_quantity: f64,
    pub carried_weight_kg: f64,
    pub percent_complete_at_split: f64,
    pub target_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

// ==========================================
// GenealogyNode / GenealogyTree - 任务谱系
// ==========================================
// 只读报表结构,镜像前端递归片段渲染
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenealogyNode {
    pub task_id: String,
    pub date: NaiveDate,
    pub is_continuation: bool,
    pub quantity_assigned: f64,
    pub quantity_completed: f64,
    pub percent_complete: f64,
    pub children: Vec<GenealogyNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenealogyTree {
    pub root_task_id: String,
    pub process_description: String,
    pub machine_code: String,
    pub total_quantity: f64,   // 根片段原始计划数量
    pub global_progress: f64,  // 全树完成率 (%)
    pub root: GenealogyNode,
}
