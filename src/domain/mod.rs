// ==========================================
// 车间生产执行系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod adjustment;
pub mod program;
pub mod route;
pub mod task;
pub mod types;

// 重导出核心类型
pub use adjustment::{
    AdjustmentApplyResult, AdjustmentOutcome, AdjustmentReport, AdjustmentSuggestion,
};
pub use program::{DailySummary, DayReport, ProductionProgram};
pub use route::{RouteItem, WorkOrder};
pub use task::{
    ContinuationLink, ContinuationPlan, GenealogyNode, GenealogyTree, TaskFragment, TaskPatch,
};
pub use types::{DayReportState, TaskState};
