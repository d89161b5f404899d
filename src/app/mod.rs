// ==========================================
// 车间生产执行系统 - 应用层
// ==========================================
// 职责: 应用状态装配与运行环境
// ==========================================

pub mod state;

pub use state::AppState;

/// 获取默认数据库路径
///
/// 优先使用系统数据目录; 不可用时退回当前目录
pub fn get_default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    let dir = base.join("workshop-mes");

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(error = %e, "无法创建数据目录, 使用当前目录");
        return "workshop_mes.db".to_string();
    }

    dir.join("workshop_mes.db").to_string_lossy().to_string()
}
