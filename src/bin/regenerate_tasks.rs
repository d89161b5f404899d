// Small dev utility: regenerate the task fragments of one production program.
//
// Usage:
//   cargo run --bin regenerate_tasks -- [db_path] <program_id>
//
// Destructive: existing fragments AND day reports of the program are deleted.

use chrono::Local;
use workshop_mes::app::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    workshop_mes::logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .unwrap_or_else(|| "workshop_mes.db".to_string());

    let program_id = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("缺少 program_id 参数"))?;

    let state = AppState::new(db_path)
        .map_err(|e| anyhow::anyhow!("无法初始化AppState: {}", e))?;

    let now = Local::now().naive_local();
    let count = state
        .program_api
        .regenerate_tasks(&program_id, now)
        .await
        .map_err(|e| anyhow::anyhow!("重新生成失败: {}", e))?;

    tracing::info!(program_id = %program_id, fragment_count = count, "任务片段重新生成完成");

    Ok(())
}
