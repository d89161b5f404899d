// ==========================================
// 车间生产执行系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 任务状态 (Task State)
// ==========================================
// CONTINUED: 日结拆分后父任务的终态,数量快照冻结
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,    // 待生产
    InProgress, // 生产中
    Completed,  // 已完成
    Continued,  // 已延续到下一工作日
    Stopped,    // 已停止
}

impl TaskState {
    /// 是否计入日结的"未完成"集合
    pub fn is_open(&self) -> bool {
        matches!(self, TaskState::Pending | TaskState::InProgress)
    }

    /// 是否为终态（不再接受编辑）
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Continued)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::InProgress => write!(f, "IN_PROGRESS"),
            TaskState::Completed => write!(f, "COMPLETED"),
            TaskState::Continued => write!(f, "CONTINUED"),
            TaskState::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskState::Pending),
            "IN_PROGRESS" => Ok(TaskState::InProgress),
            "COMPLETED" => Ok(TaskState::Completed),
            "CONTINUED" => Ok(TaskState::Continued),
            "STOPPED" => Ok(TaskState::Stopped),
            other => Err(format!("未知任务状态: {}", other)),
        }
    }
}

// ==========================================
// 日结状态 (Day Report State)
// ==========================================
// FINALIZED 为终态,不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayReportState {
    Open,      // 日结未执行
    Finalized, // 已日结
}

impl fmt::Display for DayReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayReportState::Open => write!(f, "OPEN"),
            DayReportState::Finalized => write!(f, "FINALIZED"),
        }
    }
}

impl FromStr for DayReportState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(DayReportState::Open),
            "FINALIZED" => Ok(DayReportState::Finalized),
            other => Err(format!("未知日结状态: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_roundtrip() {
        for state in [
            TaskState::Pending,
            TaskState::InProgress,
            TaskState::Completed,
            TaskState::Continued,
            TaskState::Stopped,
        ] {
            let parsed: TaskState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn test_open_states() {
        assert!(TaskState::Pending.is_open());
        assert!(TaskState::InProgress.is_open());
        assert!(!TaskState::Completed.is_open());
        assert!(!TaskState::Continued.is_open());
        assert!(!TaskState::Stopped.is_open());
    }
}
