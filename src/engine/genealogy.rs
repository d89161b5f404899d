// ==========================================
// 车间生产执行系统 - 任务谱系索引
// ==========================================
// 职责: 维护原始任务与其延续片段之间的父子关系,
//       以嵌套树形式回答谱系查询
// 只读报表结构: 树不被直接修改, 链接仅在日结时追加
// ==========================================

use crate::domain::task::{GenealogyNode, GenealogyTree, TaskFragment};
use crate::repository::{
    ContinuationLinkRepository, ProgramRepository, RepositoryError, RepositoryResult,
    TaskRepository,
};
use std::sync::Arc;
use tracing::warn;

// ==========================================
// GenealogyIndex - 谱系索引
// ==========================================
pub struct GenealogyIndex {
    task_repo: Arc<TaskRepository>,
    link_repo: Arc<ContinuationLinkRepository>,
    program_repo: Arc<ProgramRepository>,
}

impl GenealogyIndex {
    pub fn new(
        task_repo: Arc<TaskRepository>,
        link_repo: Arc<ContinuationLinkRepository>,
        program_repo: Arc<ProgramRepository>,
    ) -> Self {
        Self {
            task_repo,
            link_repo,
            program_repo,
        }
    }

    /// 追加延续链接
    ///
    /// 日结编排器经事务化提交写入链接; 本方法面向单链接追加
    /// (修数等人工场景), 同样受"一父一天一子"约束保护
    ///
    /// # 返回
    /// - `Err(DuplicateLink)`: 不变式被破坏的信号, 按缺陷处理
    pub fn record_link(
        &self,
        link: &crate::domain::task::ContinuationLink,
    ) -> RepositoryResult<()> {
        self.link_repo.record_link(link)
    }

    /// 查询任务谱系树
    ///
    /// 从任意节点出发: 先沿父链接回溯到根 (原始片段),
    /// 再向下展开全部延续, 节点按日期升序
    ///
    /// # 返回
    /// - `Err(NotFound)`: task_id 既不是根也不是任何延续
    pub fn get_genealogy(&self, task_id: &str) -> RepositoryResult<GenealogyTree> {
        let start = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "task_fragment".to_string(),
                id: task_id.to_string(),
            })?;

        let root = self.resolve_root(start)?;
        let (node, total_completed) = self.build_node(&root)?;

        // 全局进度以根片段的原始计划数量为分母:
        // 延续片段重排的是父片段的缺口, 对全节点求和会重复计数
        let global_progress = if root.quantity_programmed > 0.0 {
            total_completed / root.quantity_programmed * 100.0
        } else {
            0.0
        };

        let (process_description, machine_code) = self.route_context(&root);

        Ok(GenealogyTree {
            root_task_id: root.task_id.clone(),
            process_description,
            machine_code,
            total_quantity: root.quantity_programmed,
            global_progress,
            root: node,
        })
    }

    /// 沿父链接回溯到原始片段
    fn resolve_root(&self, mut current: TaskFragment) -> RepositoryResult<TaskFragment> {
        while let Some(link) = self.link_repo.parent_of(&current.task_id)? {
            current = self.task_repo.find_by_id(&link.parent_task_id)?.ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "task_fragment".to_string(),
                    id: link.parent_task_id.clone(),
                }
            })?;
        }
        Ok(current)
    }

    /// 递归构建谱系节点, 返回 (节点, 子树累计完成数量)
    fn build_node(&self, task: &TaskFragment) -> RepositoryResult<(GenealogyNode, f64)> {
        let mut children = Vec::new();
        let mut subtree_completed = task.quantity_completed;

        for link in self.link_repo.children_of(&task.task_id)? {
            let child = self.task_repo.find_by_id(&link.child_task_id)?.ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "task_fragment".to_string(),
                    id: link.child_task_id.clone(),
                }
            })?;

            let (child_node, child_completed) = self.build_node(&child)?;
            subtree_completed += child_completed;
            children.push(child_node);
        }

        let node = GenealogyNode {
            task_id: task.task_id.clone(),
            date: task.date,
            is_continuation: task.is_continuation,
            quantity_assigned: task.quantity_programmed,
            quantity_completed: task.quantity_completed,
            percent_complete: task.percent_complete(),
            children,
        };

        Ok((node, subtree_completed))
    }

    /// 根片段的工序/机台上下文 (仅用于展示, 缺失不阻断查询)
    fn route_context(&self, root: &TaskFragment) -> (String, String) {
        match self.program_repo.find_route_item(&root.route_item_id) {
            Ok(Some(item)) => (item.process_description, item.machine_code),
            Ok(None) => {
                warn!(
                    route_item_id = %root.route_item_id,
                    "谱系根片段引用的工艺路线项不存在"
                );
                (String::new(), String::new())
            }
            Err(e) => {
                warn!(error = %e, "读取工艺路线上下文失败");
                (String::new(), String::new())
            }
        }
    }
}
