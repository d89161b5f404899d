// ==========================================
// 机加工车间生产执行系统 - 主入口
// ==========================================
// 启动流程: 日志 → 数据库 → AppState → 启动摘要
// ==========================================

use workshop_mes::app::{get_default_db_path, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    workshop_mes::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", workshop_mes::APP_NAME);
    tracing::info!("系统版本: {}", workshop_mes::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 第一个参数或默认位置
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .map_err(|e| anyhow::anyhow!("无法初始化AppState: {}", e))?;

    // 启动摘要: 程序清单与整体进度
    let programs = state
        .program_api
        .list_programs()
        .map_err(|e| anyhow::anyhow!("读取程序列表失败: {}", e))?;

    tracing::info!(program_count = programs.len(), "AppState初始化成功");

    for program in &programs {
        let progress = state
            .program_api
            .get_program_progress(&program.program_id)
            .unwrap_or(0.0);

        tracing::info!(
            program_id = %program.program_id,
            program_name = %program.program_name,
            start_date = %program.start_date,
            end_date = ?program.end_date,
            progress = %format!("{:.1}%", progress),
            "生产程序"
        );
    }

    Ok(())
}
