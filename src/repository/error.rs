// ==========================================
// 车间生产执行系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 业务规则错误 =====
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("日结已执行: program_id={program_id}, date={date}")]
    AlreadyFinalized { program_id: String, date: String },

    #[error("重复延续链接: parent_task_id={parent_task_id}, target_date={target_date}")]
    DuplicateLink {
        parent_task_id: String,
        target_date: String,
    },

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),
}

/// 仓储层结果类型
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                let detail = msg.clone().unwrap_or_else(|| e.to_string());
                match e.code {
                    rusqlite::ErrorCode::ConstraintViolation => {
                        if detail.contains("FOREIGN KEY") {
                            RepositoryError::ForeignKeyViolation(detail)
                        } else {
                            RepositoryError::UniqueConstraintViolation(detail)
                        }
                    }
                    _ => RepositoryError::DatabaseQueryError(detail),
                }
            }
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}
