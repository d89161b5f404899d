// ==========================================
// 车间生产执行系统 - 重排建议引擎
// ==========================================
// 职责: 检测优先级/工时变更引入的机台超占, 提出日期平移建议
// 建议为即时计算, 不落库; 应用时逐条独立提交并逐条上报结果
// ==========================================

use crate::config::SchedulingConfigReader;
use crate::domain::adjustment::{
    AdjustmentApplyResult, AdjustmentOutcome, AdjustmentReport, AdjustmentSuggestion,
};
use crate::domain::types::TaskState;
use crate::engine::calendar::WorkCalendar;
use crate::repository::{
    DayReportRepository, ProgramRepository, RepositoryError, RepositoryResult, TaskRepository,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// ReadjustmentAdvisor - 重排建议引擎
// ==========================================
pub struct ReadjustmentAdvisor<C>
where
    C: SchedulingConfigReader,
{
    config: Arc<C>,
    task_repo: Arc<TaskRepository>,
    program_repo: Arc<ProgramRepository>,
    day_report_repo: Arc<DayReportRepository>,
}

impl<C> ReadjustmentAdvisor<C>
where
    C: SchedulingConfigReader,
{
    pub fn new(
        config: Arc<C>,
        task_repo: Arc<TaskRepository>,
        program_repo: Arc<ProgramRepository>,
        day_report_repo: Arc<DayReportRepository>,
    ) -> Self {
        Self {
            config,
            task_repo,
            program_repo,
            day_report_repo,
        }
    }

    /// 检查程序是否需要重排
    ///
    /// 按工单优先级顺序在各机台时间线上模拟工艺路线,
    /// 机台被更高优先级占用时产生平移建议;
    /// 建议按 (工单, 工序) 去重, 保留最后一次计算结果
    pub async fn check(&self, program_id: &str) -> RepositoryResult<AdjustmentReport> {
        let program = self
            .program_repo
            .find_by_id(program_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "production_program".to_string(),
                id: program_id.to_string(),
            })?;

        let calendar = self.load_calendar().await?;
        let setup = Duration::minutes(
            self.config
                .get_setup_minutes()
                .await
                .map_err(|e| RepositoryError::ValidationError(format!("换型时间配置无效: {}", e)))?,
        );

        let orders = self.program_repo.list_work_orders(program_id)?;

        // 机台下一可用时刻
        let mut machine_free: HashMap<String, NaiveDateTime> = HashMap::new();
        let mut raw_suggestions: Vec<AdjustmentSuggestion> = Vec::new();
        let mut latest_end: Option<NaiveDateTime> = None;

        let program_start = program
            .start_date
            .and_time(calendar.workday_start_time());

        for (order, priority) in &orders {
            let mut cursor = calendar.normalize(program_start);

            for item in self.program_repo.list_route_items_for_order(&order.order_id)? {
                let Some(hours) = item.estimated_hours() else {
                    warn!(
                        route_item_id = %item.route_item_id,
                        order_code = %order.order_code,
                        "标准产率无效, 跳过该工序"
                    );
                    continue;
                };

                let start = calendar.normalize(cursor);

                let actual_start = match machine_free.get(&item.machine_id) {
                    Some(free) if *free > start => {
                        // 机台被占用: 建议平移到释放后 (含换型时间)
                        let proposed = calendar.normalize(*free + setup);

                        debug!(
                            order_code = %order.order_code,
                            process_code = %item.process_code,
                            machine_code = %item.machine_code,
                            priority = *priority,
                            original = %start,
                            proposed = %proposed,
                            "检测到机台冲突"
                        );

                        raw_suggestions.push(AdjustmentSuggestion {
                            order_code: order.order_code.clone(),
                            route_item_id: item.route_item_id.clone(),
                            process_code: item.process_code.clone(),
                            process_description: item.process_description.clone(),
                            machine_id: item.machine_id.clone(),
                            machine_code: item.machine_code.clone(),
                            original_start: start,
                            proposed_start: proposed,
                        });

                        proposed
                    }
                    _ => start,
                };

                let end = calendar.advance(actual_start, hours);
                machine_free.insert(item.machine_id.clone(), end);

                latest_end = Some(match latest_end {
                    Some(prev) if prev >= end => prev,
                    _ => end,
                });

                // 下一工序在前序结束后开始
                cursor = end;
            }
        }

        let suggestions = dedup_keep_last(raw_suggestions);

        info!(
            program_id = %program_id,
            suggestion_count = suggestions.len(),
            "重排检查完成"
        );

        Ok(AdjustmentReport {
            program_id: program_id.to_string(),
            requires_adjustment: !suggestions.is_empty(),
            current_end_date: program.end_date,
            proposed_end_date: latest_end.map(|dt| dt.date()),
            suggestions,
        })
    }

    /// 应用已确认的建议
    ///
    /// 每条建议独立提交: 单条失败不影响其余建议,
    /// 但必须逐条上报结果, 不允许整体静默失败
    pub async fn apply(
        &self,
        program_id: &str,
        adjustments: &[AdjustmentSuggestion],
        now: NaiveDateTime,
    ) -> RepositoryResult<AdjustmentApplyResult> {
        self.program_repo
            .find_by_id(program_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "production_program".to_string(),
                id: program_id.to_string(),
            })?;

        let calendar = self.load_calendar().await?;
        let mut outcomes = Vec::with_capacity(adjustments.len());

        for adj in adjustments {
            let outcome = self.apply_one(program_id, adj, &calendar, now);
            outcomes.push(match outcome {
                Ok(()) => AdjustmentOutcome {
                    route_item_id: adj.route_item_id.clone(),
                    applied: true,
                    error: None,
                },
                Err(e) => AdjustmentOutcome {
                    route_item_id: adj.route_item_id.clone(),
                    applied: false,
                    error: Some(e.to_string()),
                },
            });
        }

        // 平移后重算程序结束日期; 失败仅告警, 不影响已应用的建议
        if let Err(e) = self.refresh_end_date(program_id, now) {
            warn!(program_id = %program_id, error = %e, "重算程序结束日期失败");
        }

        let applied_count = outcomes.iter().filter(|o| o.applied).count();
        let failed_count = outcomes.len() - applied_count;

        info!(
            program_id = %program_id,
            applied = applied_count,
            failed = failed_count,
            "重排应用完成"
        );

        Ok(AdjustmentApplyResult {
            program_id: program_id.to_string(),
            applied_count,
            failed_count,
            outcomes,
        })
    }

    /// 应用单条建议: 将该工艺路线项的待生产片段整体平移
    fn apply_one(
        &self,
        program_id: &str,
        adj: &AdjustmentSuggestion,
        calendar: &WorkCalendar,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let delta_days =
            (adj.proposed_start.date() - adj.original_start.date()).num_days();

        let tasks = self
            .task_repo
            .list_for_route_item(program_id, &adj.route_item_id)?;

        let movable: Vec<_> = tasks
            .iter()
            .filter(|t| t.state == TaskState::Pending)
            .collect();

        if movable.is_empty() {
            return Err(RepositoryError::ValidationError(format!(
                "工艺路线项 {} 没有可平移的待生产任务",
                adj.route_item_id
            )));
        }

        let mut updates: Vec<(String, NaiveDate)> = Vec::with_capacity(movable.len());
        for task in &movable {
            let mut new_date = task.date + Duration::days(delta_days);
            if !calendar.is_working_day(new_date) {
                new_date = calendar.next_working_day(new_date);
            }

            if self.day_report_repo.is_finalized(program_id, new_date)? {
                return Err(RepositoryError::ValidationError(format!(
                    "目标日期 {} 已日结, 无法平移任务 {}",
                    new_date, task.task_id
                )));
            }

            updates.push((task.task_id.clone(), new_date));
        }

        // 正向平移先改晚的片段, 避免 (program, route_item, date) 唯一约束瞬时冲突
        if delta_days > 0 {
            updates.sort_by(|a, b| b.1.cmp(&a.1));
        } else {
            updates.sort_by(|a, b| a.1.cmp(&b.1));
        }

        self.task_repo.reschedule_tasks(&updates, now)
    }

    /// 以任务片段的最晚日期刷新程序结束日期
    fn refresh_end_date(&self, program_id: &str, now: NaiveDateTime) -> RepositoryResult<()> {
        let tasks = self.task_repo.list_for_program(program_id)?;
        let end = tasks.iter().map(|t| t.date).max();
        self.program_repo.update_end_date(program_id, end, now)
    }

    async fn load_calendar(&self) -> RepositoryResult<WorkCalendar> {
        WorkCalendar::load(self.config.as_ref())
            .await
            .map_err(|e| RepositoryError::ValidationError(format!("工作日历配置无效: {}", e)))
    }
}

/// 按 (工单, 工序) 去重, 保留最后一次计算的建议;
/// 输出顺序为各键首次出现的顺序
fn dedup_keep_last(suggestions: Vec<AdjustmentSuggestion>) -> Vec<AdjustmentSuggestion> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut latest: HashMap<(String, String), AdjustmentSuggestion> = HashMap::new();

    for s in suggestions {
        let key = (s.order_code.clone(), s.process_code.clone());
        if !latest.contains_key(&key) {
            order.push(key.clone());
        }
        latest.insert(key, s);
    }

    order
        .into_iter()
        .filter_map(|key| latest.remove(&key))
        .collect()
}
