// ==========================================
// 机加工车间生产执行系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 日结与任务延续核心 (人工最终控制权)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DayReportState, TaskState};

// 领域实体
pub use domain::{
    AdjustmentApplyResult, AdjustmentReport, AdjustmentSuggestion, ContinuationLink,
    ContinuationPlan, DailySummary, DayReport, GenealogyNode, GenealogyTree, ProductionProgram,
    RouteItem, TaskFragment, TaskPatch, WorkOrder,
};

// 引擎
pub use engine::{
    ContinuationEngine, DayFinalizationOrchestrator, FinalizationPreview, FinalizationResult,
    GenealogyIndex, ReadjustmentAdvisor, TaskGenerator, WorkCalendar, WorkOrderImporter,
};

// API
pub use api::{ApiError, ApiResult, ProgramApi, TaskApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "机加工车间生产执行系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
