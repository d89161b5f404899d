// ==========================================
// 车间生产执行系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::error::Error;
use std::sync::{Arc, Mutex};

use crate::api::{ProgramApi, TaskApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{
    DayFinalizationOrchestrator, GenealogyIndex, ReadjustmentAdvisor, TaskGenerator,
    WorkOrderImporter,
};
use crate::repository::{
    ContinuationLinkRepository, DayReportRepository, ProgramRepository, TaskRepository,
};
use tracing::warn;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 任务API
    pub task_api: Arc<TaskApi>,

    /// 生产程序API
    pub program_api: Arc<ProgramApi<ConfigManager>>,

    /// 配置管理器
    pub config: Arc<ConfigManager>,
}

impl AppState {
    /// 初始化应用状态
    ///
    /// 打开数据库、应用统一 PRAGMA、建表 (幂等)、装配仓储/引擎/API
    pub fn new(db_path: String) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let conn = open_sqlite_connection(&db_path)?;
        init_schema(&conn)?;

        match read_schema_version(&conn)? {
            Some(v) if v != CURRENT_SCHEMA_VERSION => {
                warn!(
                    found = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema 版本与代码期望不一致"
                );
            }
            None => warn!("数据库缺少 schema_version 表"),
            _ => {}
        }

        let conn = Arc::new(Mutex::new(conn));

        // 仓储层
        let task_repo = Arc::new(TaskRepository::new(conn.clone()));
        let link_repo = Arc::new(ContinuationLinkRepository::new(conn.clone()));
        let program_repo = Arc::new(ProgramRepository::new(conn.clone()));
        let day_report_repo = Arc::new(DayReportRepository::new(conn.clone()));

        // 配置层
        let config = Arc::new(ConfigManager::from_connection(conn)?);

        // 引擎层
        let genealogy = Arc::new(GenealogyIndex::new(
            task_repo.clone(),
            link_repo.clone(),
            program_repo.clone(),
        ));
        let orchestrator = Arc::new(DayFinalizationOrchestrator::new(
            config.clone(),
            task_repo.clone(),
            day_report_repo.clone(),
            program_repo.clone(),
        ));
        let advisor = Arc::new(ReadjustmentAdvisor::new(
            config.clone(),
            task_repo.clone(),
            program_repo.clone(),
            day_report_repo.clone(),
        ));
        let generator = Arc::new(TaskGenerator::new(
            config.clone(),
            task_repo.clone(),
            program_repo.clone(),
        ));
        let importer = Arc::new(WorkOrderImporter::new(program_repo.clone()));

        // API层
        let task_api = Arc::new(TaskApi::new(
            task_repo.clone(),
            program_repo.clone(),
            day_report_repo.clone(),
            genealogy,
        ));
        let program_api = Arc::new(ProgramApi::new(
            program_repo,
            task_repo,
            day_report_repo,
            task_api.clone(),
            orchestrator,
            advisor,
            generator,
            importer,
        ));

        Ok(Self {
            db_path,
            task_api,
            program_api,
            config,
        })
    }
}
