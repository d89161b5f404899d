// ==========================================
// 车间生产执行系统 - 日结编排器
// ==========================================
// 状态机 (按 program_id + date): Open → Previewed → Finalized (终态)
// - Previewed 不落库: 每次预览都基于当前任务状态重新计算 (幂等)
// - Finalized 不可回退; 同一天的并发日结经按键互斥锁串行化
// 本引擎是唯一允许以提交模式驱动延续引擎的调用方
// ==========================================

use crate::config::SchedulingConfigReader;
use crate::domain::program::DayReport;
use crate::domain::task::{ContinuationLink, ContinuationPlan, TaskFragment};
use crate::domain::types::DayReportState;
use crate::engine::calendar::WorkCalendar;
use crate::engine::continuation::ContinuationEngine;
use crate::i18n;
use crate::repository::{
    DayReportRepository, ProgramRepository, RepositoryError, RepositoryResult, TaskRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// 预览与日结结果
// ==========================================

/// 单条待延续任务的预览
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTaskPreview {
    pub task_id: String,
    pub order_code: String,
    pub process_description: String,
    pub quantity_pending: f64,
    pub percent_complete: f64,
    pub plan: ContinuationPlan,
}

/// 日结预览 (纯计算, 不落库)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizationPreview {
    pub program_id: String,
    pub date: NaiveDate,
    pub next_working_day: NaiveDate,
    pub pending_tasks: Vec<PendingTaskPreview>,
}

/// 已创建的延续
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedContinuation {
    pub parent_task_id: String,
    pub child_task_id: String,
    pub carried_quantity: f64,
}

/// 日结结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizationResult {
    pub program_id: String,
    pub date: NaiveDate,
    pub next_working_day: NaiveDate,
    pub created: Vec<CreatedContinuation>,
    pub total_created: usize,
    pub message: String,
}

// ==========================================
// DayLockRegistry - 按 (program_id, date) 的互斥锁注册表
// ==========================================
// 同一程序同一天的日结必须串行: 后到者等待先行者完成,
// 随后观察到 AlreadyFinalized
struct DayLockRegistry {
    locks: Mutex<HashMap<(String, NaiveDate), Arc<tokio::sync::Mutex<()>>>>,
}

impl DayLockRegistry {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, program_id: &str, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((program_id.to_string(), date))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

// ==========================================
// DayFinalizationOrchestrator - 日结编排器
// ==========================================
pub struct DayFinalizationOrchestrator<C>
where
    C: SchedulingConfigReader,
{
    config: Arc<C>,
    engine: ContinuationEngine,
    task_repo: Arc<TaskRepository>,
    day_report_repo: Arc<DayReportRepository>,
    program_repo: Arc<ProgramRepository>,
    day_locks: DayLockRegistry,
}

impl<C> DayFinalizationOrchestrator<C>
where
    C: SchedulingConfigReader,
{
    pub fn new(
        config: Arc<C>,
        task_repo: Arc<TaskRepository>,
        day_report_repo: Arc<DayReportRepository>,
        program_repo: Arc<ProgramRepository>,
    ) -> Self {
        Self {
            config,
            engine: ContinuationEngine::new(),
            task_repo,
            day_report_repo,
            program_repo,
            day_locks: DayLockRegistry::new(),
        }
    }

    /// 日结预览 (干跑)
    ///
    /// 对当天所有未完成任务计算延续计划; 不产生任何写入。
    /// 两次调用之间无任务编辑时, 结果完全一致 (幂等律)
    pub async fn preview(
        &self,
        program_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<FinalizationPreview> {
        self.ensure_program_exists(program_id)?;
        self.ensure_not_finalized(program_id, date)?;

        let calendar = self.load_calendar().await?;
        let next_working_day = calendar.next_working_day(date);

        let pending_tasks = self.compute_pending(program_id, date, next_working_day)?;

        debug!(
            program_id = %program_id,
            date = %date,
            pending_count = pending_tasks.len(),
            "日结预览完成"
        );

        Ok(FinalizationPreview {
            program_id: program_id.to_string(),
            date,
            next_working_day,
            pending_tasks,
        })
    }

    /// 执行日结 (终态转换, 不可回退)
    ///
    /// 对每个未完成任务创建延续片段并记录谱系链接,
    /// 随后写入 FINALIZED 日结记录, 全部在单个事务内完成;
    /// 任一延续创建失败则整体回滚, 当天不会被标记为已日结
    pub async fn finalize(
        &self,
        program_id: &str,
        date: NaiveDate,
        closed_by: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<FinalizationResult> {
        // 按 (program_id, date) 串行化; 后到者在锁释放后观察到 AlreadyFinalized
        let key_lock = self.day_locks.lock_for(program_id, date);
        let _guard = key_lock.lock().await;

        self.ensure_program_exists(program_id)?;
        self.ensure_not_finalized(program_id, date)?;

        let calendar = self.load_calendar().await?;
        let next_working_day = calendar.next_working_day(date);

        let pending = self.compute_pending(program_id, date, next_working_day)?;

        let children: Vec<(TaskFragment, ContinuationLink)> = pending
            .iter()
            .map(|p| self.engine.materialize(&p.plan, now))
            .collect();

        let report = DayReport {
            program_id: program_id.to_string(),
            report_date: date,
            state: DayReportState::Finalized,
            closed_by: Some(closed_by.to_string()),
            closed_at: Some(now),
            close_observations: String::new(),
        };

        self.task_repo.commit_finalization(&report, &children)?;

        let created: Vec<CreatedContinuation> = children
            .iter()
            .map(|(child, link)| CreatedContinuation {
                parent_task_id: link.parent_task_id.clone(),
                child_task_id: child.task_id.clone(),
                carried_quantity: link.carried_quantity,
            })
            .collect();

        info!(
            program_id = %program_id,
            date = %date,
            created_count = created.len(),
            next_working_day = %next_working_day,
            "日结完成"
        );

        Ok(FinalizationResult {
            program_id: program_id.to_string(),
            date,
            next_working_day,
            total_created: created.len(),
            created,
            message: i18n::t("finalize.success"),
        })
    }

    /// 收集当天待延续任务并计算延续计划
    ///
    /// 过滤: 状态为 PENDING / IN_PROGRESS 且仍有缺口的任务;
    /// STOPPED 任务由人工决定去向, 不自动延续
    fn compute_pending(
        &self,
        program_id: &str,
        date: NaiveDate,
        target_date: NaiveDate,
    ) -> RepositoryResult<Vec<PendingTaskPreview>> {
        let tasks = self.task_repo.list_for_day(program_id, date)?;
        let mut pending = Vec::new();

        for task in &tasks {
            if !task.state.is_open() {
                continue;
            }

            let Some(plan) = self.engine.compute_continuation(task, target_date) else {
                continue;
            };

            let (order_code, process_description) = self.route_context(&task.route_item_id);

            pending.push(PendingTaskPreview {
                task_id: task.task_id.clone(),
                order_code,
                process_description,
                quantity_pending: task.quantity_pending(),
                percent_complete: task.percent_complete(),
                plan,
            });
        }

        Ok(pending)
    }

    /// 加载工作日历 (配置读取失败视为数据验证错误)
    async fn load_calendar(&self) -> RepositoryResult<WorkCalendar> {
        WorkCalendar::load(self.config.as_ref())
            .await
            .map_err(|e| RepositoryError::ValidationError(format!("工作日历配置无效: {}", e)))
    }

    fn ensure_program_exists(&self, program_id: &str) -> RepositoryResult<()> {
        self.program_repo
            .find_by_id(program_id)?
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "production_program".to_string(),
                id: program_id.to_string(),
            })
    }

    fn ensure_not_finalized(&self, program_id: &str, date: NaiveDate) -> RepositoryResult<()> {
        if self.day_report_repo.is_finalized(program_id, date)? {
            return Err(RepositoryError::AlreadyFinalized {
                program_id: program_id.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
            });
        }
        Ok(())
    }

    /// 工单编号与工序描述 (仅用于展示, 缺失不阻断日结)
    fn route_context(&self, route_item_id: &str) -> (String, String) {
        let Ok(Some(item)) = self.program_repo.find_route_item(route_item_id) else {
            return (String::new(), String::new());
        };

        let order_code = match self.program_repo.find_work_order(&item.order_id) {
            Ok(Some(order)) => order.order_code,
            _ => String::new(),
        };

        (order_code, item.process_description)
    }
}
