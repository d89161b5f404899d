// ==========================================
// 车间生产执行系统 - 任务延续引擎
// ==========================================
// 职责: 对单个未完成任务计算其延续计划并物化为子片段
// compute_continuation 为纯函数,支持真正的日结预览 (无副作用)
// 目标日期必须由调用方 (日结编排器) 预先解析为工作日,
// 本引擎不跳过周末
// ==========================================

use crate::domain::task::{ContinuationLink, ContinuationPlan, TaskFragment};
use crate::domain::types::TaskState;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

// ==========================================
// ContinuationEngine - 延续引擎
// ==========================================
pub struct ContinuationEngine;

impl ContinuationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 计算延续计划 (纯函数)
    ///
    /// # 返回
    /// - `None`: 完成数量已达计划数量, 无需延续
    /// - `Some(plan)`: 结转数量 = 计划 - 完成 (下限钳制为 0,
    ///   防止超报完成导致负结转)
    pub fn compute_continuation(
        &self,
        task: &TaskFragment,
        target_date: NaiveDate,
    ) -> Option<ContinuationPlan> {
        if task.quantity_completed >= task.quantity_programmed {
            return None;
        }

        Some(ContinuationPlan {
            parent_task_id: task.task_id.clone(),
            program_id: task.program_id.clone(),
            route_item_id: task.route_item_id.clone(),
            priority: task.priority,
            target_date,
            carried_quantity: task.quantity_pending(),
            carried_weight_kg: task.weight_pending_kg(),
            percent_complete_at_split: task.percent_complete(),
            fragment_level: task.fragment_level + 1,
        })
    }

    /// 将延续计划物化为子片段与链接 (纯构造, 不落库)
    ///
    /// 子片段: 继承工艺路线与优先级; 操作工按日指派,不继承;
    /// 状态 PENDING, 谱系深度 = 父 + 1
    ///
    /// 落库由日结编排器经单一事务提交, 保证全有或全无
    pub fn materialize(
        &self,
        plan: &ContinuationPlan,
        now: NaiveDateTime,
    ) -> (TaskFragment, ContinuationLink) {
        let child_id = Uuid::new_v4().to_string();

        let child = TaskFragment {
            task_id: child_id.clone(),
            program_id: plan.program_id.clone(),
            route_item_id: plan.route_item_id.clone(),
            date: plan.target_date,
            priority: plan.priority,
            quantity_programmed: plan.carried_quantity,
            quantity_completed: 0.0,
            weight_programmed_kg: plan.carried_weight_kg,
            weight_completed_kg: None,
            state: TaskState::Pending,
            is_continuation: true,
            fragment_level: plan.fragment_level,
            operator_id: None,
            observations: String::new(),
            created_at: now,
            updated_at: now,
        };

        let link = ContinuationLink {
            parent_task_id: plan.parent_task_id.clone(),
            child_task_id: child_id,
            carried_quantity: plan.carried_quantity,
            carried_weight_kg: plan.carried_weight_kg,
            percent_complete_at_split: plan.percent_complete_at_split,
            target_date: plan.target_date,
            created_at: now,
        };

        (child, link)
    }
}

impl Default for ContinuationEngine {
    fn default() -> Self {
        Self::new()
    }
}
