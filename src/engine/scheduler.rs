// ==========================================
// 车间生产执行系统 - 任务生成引擎
// ==========================================
// 职责: 把工艺路线项的数量按工作日产能切分为任务片段
// 重新生成会先清空程序的全部片段与日结记录 (显式破坏性操作)
// ==========================================

use crate::config::SchedulingConfigReader;
use crate::domain::task::TaskFragment;
use crate::domain::types::TaskState;
use crate::engine::calendar::WorkCalendar;
use crate::repository::{
    ProgramRepository, RepositoryError, RepositoryResult, TaskRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ==========================================
// TaskGenerator - 任务生成引擎
// ==========================================
pub struct TaskGenerator<C>
where
    C: SchedulingConfigReader,
{
    config: Arc<C>,
    task_repo: Arc<TaskRepository>,
    program_repo: Arc<ProgramRepository>,
}

impl<C> TaskGenerator<C>
where
    C: SchedulingConfigReader,
{
    pub fn new(
        config: Arc<C>,
        task_repo: Arc<TaskRepository>,
        program_repo: Arc<ProgramRepository>,
    ) -> Self {
        Self {
            config,
            task_repo,
            program_repo,
        }
    }

    /// 重新生成程序的任务片段
    ///
    /// 1. 删除既有片段与日结记录 (延续链接随片段级联删除)
    /// 2. 按工单优先级、工序顺序切分数量到工作日
    /// 3. 以片段最晚日期刷新程序结束日期
    ///
    /// # 返回
    /// - 生成的片段数量
    pub async fn regenerate(
        &self,
        program_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let program = self
            .program_repo
            .find_by_id(program_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "production_program".to_string(),
                id: program_id.to_string(),
            })?;

        let calendar = WorkCalendar::load(self.config.as_ref())
            .await
            .map_err(|e| RepositoryError::ValidationError(format!("工作日历配置无效: {}", e)))?;

        self.program_repo.delete_fragments_and_reports(program_id)?;

        let orders = self.program_repo.list_work_orders(program_id)?;
        let mut fragments: Vec<TaskFragment> = Vec::new();

        for (order, priority) in &orders {
            // 工序级联: 下一工序从上一工序结束当天开始
            let mut start_day = first_working_day(&calendar, program.start_date);

            for item in self.program_repo.list_route_items_for_order(&order.order_id)? {
                if item.standard_rate <= 0.0 {
                    warn!(
                        route_item_id = %item.route_item_id,
                        order_code = %order.order_code,
                        "标准产率无效, 工序不生成任务"
                    );
                    continue;
                }

                let mut remaining = item.quantity;
                let mut day = start_day;

                while remaining > 0.0 {
                    let capacity = calendar.work_hours_for(day) * item.standard_rate;
                    if capacity <= 0.0 {
                        day = calendar.next_working_day(day);
                        continue;
                    }

                    let qty_today = remaining.min(capacity);
                    let weight_today = order.unit_weight_kg.unwrap_or(0.0) * qty_today;

                    fragments.push(TaskFragment {
                        task_id: Uuid::new_v4().to_string(),
                        program_id: program_id.to_string(),
                        route_item_id: item.route_item_id.clone(),
                        date: day,
                        priority: *priority,
                        quantity_programmed: qty_today,
                        quantity_completed: 0.0,
                        weight_programmed_kg: weight_today,
                        weight_completed_kg: None,
                        state: TaskState::Pending,
                        is_continuation: false,
                        fragment_level: 0,
                        operator_id: None,
                        observations: String::new(),
                        created_at: now,
                        updated_at: now,
                    });

                    remaining -= qty_today;
                    if remaining > 0.0 {
                        day = calendar.next_working_day(day);
                    }
                }

                start_day = day;
            }
        }

        self.task_repo.insert_many(&fragments)?;

        let end = fragments.iter().map(|f| f.date).max();
        self.program_repo.update_end_date(program_id, end, now)?;

        info!(
            program_id = %program_id,
            fragment_count = fragments.len(),
            end_date = ?end,
            "任务片段生成完成"
        );

        Ok(fragments.len())
    }
}

/// 程序开始日期所在或之后的第一个工作日
fn first_working_day(calendar: &WorkCalendar, date: NaiveDate) -> NaiveDate {
    if calendar.is_working_day(date) {
        date
    } else {
        calendar.next_working_day(date)
    }
}
