// ==========================================
// 车间生产执行系统 - 生产程序 API
// ==========================================
// 职责: 程序级操作的对外接口
// 1. 程序管理: create_program, get_program, list_programs
// 2. 日结: preview_finalize_day, finalize_day
// 3. 重排: check_readjustments, apply_readjustments
// 4. 优先级: update_priorities (含可选工序编辑)
// 5. 汇总: get_daily_summary, get_program_progress
// 6. 数据: import_work_orders, regenerate_tasks
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::task_api::TaskApi;
use crate::config::SchedulingConfigReader;
use crate::domain::adjustment::{AdjustmentApplyResult, AdjustmentSuggestion};
use crate::domain::program::{DailySummary, ProductionProgram};
use crate::domain::task::TaskFragment;
use crate::domain::types::TaskState;
use crate::engine::{
    DayFinalizationOrchestrator, FinalizationPreview, FinalizationResult, ImportResult,
    ReadjustmentAdvisor, TaskGenerator, WorkOrderImporter,
};
use crate::repository::{DayReportRepository, ProgramRepository, TaskRepository};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// ==========================================
// 工序编辑 (与优先级更新同批提交)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEdit {
    pub route_item_id: String,
    pub machine_id: Option<String>,
    pub machine_code: Option<String>,
    pub standard_rate: Option<f64>,
}

/// 单条工序编辑的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEditOutcome {
    pub route_item_id: String,
    pub applied: bool,
    pub error: Option<String>,
}

/// 优先级更新结果: 重排后的任务快照 + 逐条工序编辑结果
#[derive(Debug, Serialize, Deserialize)]
pub struct PriorityUpdateResult {
    pub tasks: Vec<TaskFragment>,
    pub edit_outcomes: Vec<ProcessEditOutcome>,
}

// ==========================================
// ProgramApi - 生产程序接口
// ==========================================
pub struct ProgramApi<C>
where
    C: SchedulingConfigReader,
{
    program_repo: Arc<ProgramRepository>,
    task_repo: Arc<TaskRepository>,
    day_report_repo: Arc<DayReportRepository>,
    task_api: Arc<TaskApi>,
    orchestrator: Arc<DayFinalizationOrchestrator<C>>,
    advisor: Arc<ReadjustmentAdvisor<C>>,
    generator: Arc<TaskGenerator<C>>,
    importer: Arc<WorkOrderImporter>,
}

impl<C> ProgramApi<C>
where
    C: SchedulingConfigReader,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        program_repo: Arc<ProgramRepository>,
        task_repo: Arc<TaskRepository>,
        day_report_repo: Arc<DayReportRepository>,
        task_api: Arc<TaskApi>,
        orchestrator: Arc<DayFinalizationOrchestrator<C>>,
        advisor: Arc<ReadjustmentAdvisor<C>>,
        generator: Arc<TaskGenerator<C>>,
        importer: Arc<WorkOrderImporter>,
    ) -> Self {
        Self {
            program_repo,
            task_repo,
            day_report_repo,
            task_api,
            orchestrator,
            advisor,
            generator,
            importer,
        }
    }

    // ==========================================
    // 程序管理
    // ==========================================

    /// 创建生产程序
    pub fn create_program(
        &self,
        program_name: &str,
        start_date: NaiveDate,
        created_by: &str,
        now: NaiveDateTime,
    ) -> ApiResult<ProductionProgram> {
        if program_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("程序名称为空".to_string()));
        }

        let program = ProductionProgram {
            program_id: Uuid::new_v4().to_string(),
            program_name: program_name.trim().to_string(),
            start_date,
            end_date: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.program_repo.create(&program)?;

        info!(program_id = %program.program_id, program_name = %program.program_name, "程序已创建");

        Ok(program)
    }

    /// 查询程序
    pub fn get_program(&self, program_id: &str) -> ApiResult<ProductionProgram> {
        self.program_repo
            .find_by_id(program_id)?
            .ok_or_else(|| ApiError::NotFound(format!("production_program (id={})", program_id)))
    }

    /// 查询程序列表
    pub fn list_programs(&self) -> ApiResult<Vec<ProductionProgram>> {
        Ok(self.program_repo.list_all()?)
    }

    // ==========================================
    // 日结
    // ==========================================

    /// 日结预览 (干跑, 无副作用)
    pub async fn preview_finalize_day(
        &self,
        program_id: &str,
        date: NaiveDate,
    ) -> ApiResult<FinalizationPreview> {
        Ok(self.orchestrator.preview(program_id, date).await?)
    }

    /// 执行日结 (终态, 不可回退)
    pub async fn finalize_day(
        &self,
        program_id: &str,
        date: NaiveDate,
        closed_by: &str,
        now: NaiveDateTime,
    ) -> ApiResult<FinalizationResult> {
        Ok(self
            .orchestrator
            .finalize(program_id, date, closed_by, now)
            .await?)
    }

    // ==========================================
    // 重排
    // ==========================================

    /// 检查重排需求
    pub async fn check_readjustments(
        &self,
        program_id: &str,
    ) -> ApiResult<crate::domain::adjustment::AdjustmentReport> {
        Ok(self.advisor.check(program_id).await?)
    }

    /// 应用已确认的重排建议 (逐条独立, 逐条上报)
    pub async fn apply_readjustments(
        &self,
        program_id: &str,
        adjustments: &[AdjustmentSuggestion],
        now: NaiveDateTime,
    ) -> ApiResult<AdjustmentApplyResult> {
        if adjustments.is_empty() {
            return Err(ApiError::InvalidInput("建议列表为空".to_string()));
        }

        Ok(self.advisor.apply(program_id, adjustments, now).await?)
    }

    // ==========================================
    // 优先级 (+ 可选工序编辑)
    // ==========================================

    /// 更新优先级并可选地编辑工序
    ///
    /// 优先级重排本身原子; 工序编辑逐条独立提交,
    /// 结果逐条上报, 不做整体静默失败
    pub fn update_priorities(
        &self,
        program_id: &str,
        ordered_task_ids: &[String],
        process_edits: &[ProcessEdit],
        now: NaiveDateTime,
    ) -> ApiResult<PriorityUpdateResult> {
        let tasks = self
            .task_api
            .reorder_priorities(program_id, ordered_task_ids, now)?;

        let mut edit_outcomes = Vec::with_capacity(process_edits.len());
        for edit in process_edits {
            let result = self.program_repo.update_route_item(
                &edit.route_item_id,
                edit.machine_id.as_deref(),
                edit.machine_code.as_deref(),
                edit.standard_rate,
            );

            edit_outcomes.push(match result {
                Ok(()) => ProcessEditOutcome {
                    route_item_id: edit.route_item_id.clone(),
                    applied: true,
                    error: None,
                },
                Err(e) => ProcessEditOutcome {
                    route_item_id: edit.route_item_id.clone(),
                    applied: false,
                    error: Some(e.to_string()),
                },
            });
        }

        // 重排后返回最新快照 (含工序编辑影响)
        let tasks = if process_edits.is_empty() {
            tasks
        } else {
            self.task_repo.list_for_program(program_id)?
        };

        Ok(PriorityUpdateResult {
            tasks,
            edit_outcomes,
        })
    }

    // ==========================================
    // 汇总
    // ==========================================

    /// 当日汇总
    pub fn get_daily_summary(&self, program_id: &str, date: NaiveDate) -> ApiResult<DailySummary> {
        self.get_program(program_id)?;

        let tasks = self.task_repo.list_for_day(program_id, date)?;
        let completed_count = tasks
            .iter()
            .filter(|t| t.state == TaskState::Completed)
            .count();

        let percent_complete = if tasks.is_empty() {
            0.0
        } else {
            completed_count as f64 / tasks.len() as f64 * 100.0
        };

        Ok(DailySummary {
            program_id: program_id.to_string(),
            date,
            task_count: tasks.len(),
            completed_count,
            total_quantity_programmed: tasks.iter().map(|t| t.quantity_programmed).sum(),
            total_quantity_completed: tasks.iter().map(|t| t.quantity_completed).sum(),
            percent_complete,
            finalized: self.day_report_repo.is_finalized(program_id, date)?,
        })
    }

    /// 程序整体进度 (已完成任务占比, %)
    pub fn get_program_progress(&self, program_id: &str) -> ApiResult<f64> {
        self.get_program(program_id)?;

        let tasks = self.task_repo.list_for_program(program_id)?;
        if tasks.is_empty() {
            return Ok(0.0);
        }

        let completed = tasks
            .iter()
            .filter(|t| t.state == TaskState::Completed)
            .count();

        Ok(completed as f64 / tasks.len() as f64 * 100.0)
    }

    // ==========================================
    // 数据
    // ==========================================

    /// 从 CSV 导入工单及工艺路线
    pub fn import_work_orders<R: Read>(
        &self,
        program_id: &str,
        reader: R,
    ) -> ApiResult<ImportResult> {
        self.get_program(program_id)?;
        Ok(self.importer.import_csv(program_id, reader)?)
    }

    /// 重新生成程序任务片段 (显式破坏性操作)
    pub async fn regenerate_tasks(
        &self,
        program_id: &str,
        now: NaiveDateTime,
    ) -> ApiResult<usize> {
        Ok(self.generator.regenerate(program_id, now).await?)
    }
}
