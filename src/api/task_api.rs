// ==========================================
// 车间生产执行系统 - 任务 API
// ==========================================
// 职责: 任务登记表的对外接口 (按日查询/生产上报/谱系查询)
// 任务生命周期归本层之下的 Task Registry 所有
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::parse_task_ref;
use crate::domain::task::{GenealogyTree, TaskFragment, TaskPatch};
use crate::domain::types::TaskState;
use crate::engine::GenealogyIndex;
use crate::repository::{
    DayReportRepository, ProgramRepository, TaskRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// TaskApi - 任务接口
// ==========================================
pub struct TaskApi {
    task_repo: Arc<TaskRepository>,
    program_repo: Arc<ProgramRepository>,
    day_report_repo: Arc<DayReportRepository>,
    genealogy: Arc<GenealogyIndex>,
}

impl TaskApi {
    pub fn new(
        task_repo: Arc<TaskRepository>,
        program_repo: Arc<ProgramRepository>,
        day_report_repo: Arc<DayReportRepository>,
        genealogy: Arc<GenealogyIndex>,
    ) -> Self {
        Self {
            task_repo,
            program_repo,
            day_report_repo,
            genealogy,
        }
    }

    /// 查询某程序某天的任务
    ///
    /// # 返回
    /// - `Err(NotFound)`: 程序不存在
    /// - `Ok(vec![])`: 程序存在但当天无任务 (不是错误)
    pub fn list_tasks_for_day(
        &self,
        program_id: &str,
        date: NaiveDate,
    ) -> ApiResult<Vec<TaskFragment>> {
        self.ensure_program_exists(program_id)?;
        Ok(self.task_repo.list_for_day(program_id, date)?)
    }

    /// 生产上报 (部分更新)
    ///
    /// 允许字段: 完成数量/完成重量/状态/备注/操作工
    ///
    /// 规则:
    /// - CONTINUED 任务已被拆分, 快照冻结, 拒绝任何编辑
    /// - 已日结日期上的任务拒绝编辑
    /// - 置为 COMPLETED 时必须有完成重量 (补丁中或已记录)
    /// - 低于/超出目标的完成上报被接受, 但返回告警 (监督确认路径)
    ///
    /// # 返回
    /// - (更新后的任务, 告警列表)
    pub fn update_task(
        &self,
        raw_task_ref: &str,
        patch: &TaskPatch,
        now: NaiveDateTime,
    ) -> ApiResult<(TaskFragment, Vec<String>)> {
        let task_id = parse_task_ref(raw_task_ref)?;

        if patch.is_empty() {
            return Err(ApiError::InvalidInput("更新补丁为空".to_string()));
        }

        let mut task = self
            .task_repo
            .find_by_id(task_id.as_str())?
            .ok_or_else(|| ApiError::NotFound(format!("task_fragment (id={})", task_id)))?;

        if task.state.is_terminal() {
            return Err(ApiError::InvalidTransition {
                from: task.state.to_string(),
                to: patch
                    .state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| task.state.to_string()),
                reason: "任务已延续, 数量快照已冻结".to_string(),
            });
        }

        if self
            .day_report_repo
            .find(&task.program_id, task.date)?
            .map(|r| r.state == crate::domain::types::DayReportState::Finalized)
            .unwrap_or(false)
        {
            return Err(ApiError::AlreadyFinalized {
                program_id: task.program_id.clone(),
                date: task.date.format("%Y-%m-%d").to_string(),
            });
        }

        let previous_state = task.state;

        if let Some(q) = patch.quantity_completed {
            if q < 0.0 {
                return Err(ApiError::InvalidInput(format!("完成数量不能为负: {}", q)));
            }
            task.quantity_completed = q;
        }
        if let Some(w) = patch.weight_completed_kg {
            if w < 0.0 {
                return Err(ApiError::InvalidInput(format!("完成重量不能为负: {}", w)));
            }
            task.weight_completed_kg = Some(w);
        }
        if let Some(obs) = &patch.observations {
            task.observations = obs.clone();
        }
        if let Some(op) = &patch.operator_id {
            task.operator_id = op.clone();
        }
        if let Some(state) = patch.state {
            task.state = state;
        }

        let mut warnings = Vec::new();

        if task.state == TaskState::Completed {
            // 完成必须有重量上报; 低于目标仅告警 (监督已确认)
            if task.weight_completed_kg.is_none() {
                return Err(ApiError::InvalidTransition {
                    from: previous_state.to_string(),
                    to: TaskState::Completed.to_string(),
                    reason: "缺少完成重量上报".to_string(),
                });
            }

            if task.quantity_completed < task.quantity_programmed {
                let msg = format!(
                    "低于目标完成: {:.2}/{:.2}",
                    task.quantity_completed, task.quantity_programmed
                );
                warn!(task_id = %task.task_id, "{}", msg);
                warnings.push(msg);
            }
        }

        if task.quantity_completed > task.quantity_programmed {
            let msg = format!(
                "超产上报: {:.2}/{:.2}",
                task.quantity_completed, task.quantity_programmed
            );
            warn!(task_id = %task.task_id, "{}", msg);
            warnings.push(msg);
        }

        task.updated_at = now;
        self.task_repo.update_progress(&task)?;

        info!(
            task_id = %task.task_id,
            state = %task.state,
            quantity_completed = task.quantity_completed,
            "生产上报已更新"
        );

        Ok((task, warnings))
    }

    /// 原子重排程序内任务优先级 (1..N 按列表顺序)
    ///
    /// # 返回
    /// - 重排后的程序任务快照
    pub fn reorder_priorities(
        &self,
        program_id: &str,
        ordered_task_ids: &[String],
        now: NaiveDateTime,
    ) -> ApiResult<Vec<TaskFragment>> {
        self.ensure_program_exists(program_id)?;

        if ordered_task_ids.is_empty() {
            return Err(ApiError::InvalidInput("优先级列表为空".to_string()));
        }

        // UI 行键在边界处统一解析
        let domain_ids: Vec<String> = ordered_task_ids
            .iter()
            .map(|raw| parse_task_ref(raw).map(|id| id.into_string()))
            .collect::<ApiResult<_>>()?;

        self.task_repo
            .reorder_priorities(program_id, &domain_ids, now)?;

        Ok(self.task_repo.list_for_program(program_id)?)
    }

    /// 查询任务谱系树
    ///
    /// 接受裸领域ID或 UI 行键 ("item_<id>")
    pub fn get_genealogy(&self, raw_task_ref: &str) -> ApiResult<GenealogyTree> {
        let task_id = parse_task_ref(raw_task_ref)?;
        Ok(self.genealogy.get_genealogy(task_id.as_str())?)
    }

    fn ensure_program_exists(&self, program_id: &str) -> ApiResult<()> {
        self.program_repo
            .find_by_id(program_id)?
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("production_program (id={})", program_id)))
    }
}
