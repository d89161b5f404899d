// ==========================================
// 车间生产执行系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换Repository错误为用户可解释的错误
// 原则: 每个失败都携带可识别的错误种类, 不吞错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("日结已执行, 不可重复: program_id={program_id}, date={date}")]
    AlreadyFinalized { program_id: String, date: String },

    /// 谱系索引内部不变式被破坏, 按缺陷处理
    #[error("重复延续链接: {0}")]
    DuplicateLink(String),

    /// 批量操作部分成功; 逐项结果由载荷携带
    #[error("批量操作部分失败: 成功{succeeded}项, 失败{failed}项")]
    PartialFailure { succeeded: usize, failed: usize },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),
}

/// API层结果类型
pub type ApiResult<T> = Result<T, ApiError>;

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::InvalidStateTransition { from, to } => ApiError::InvalidTransition {
                from,
                to,
                reason: "仓储层拒绝该转换".to_string(),
            },
            RepositoryError::AlreadyFinalized { program_id, date } => {
                ApiError::AlreadyFinalized { program_id, date }
            }
            RepositoryError::DuplicateLink {
                parent_task_id,
                target_date,
            } => ApiError::DuplicateLink(format!(
                "parent_task_id={}, target_date={}",
                parent_task_id, target_date
            )),
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}
