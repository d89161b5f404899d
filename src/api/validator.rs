// ==========================================
// 车间生产执行系统 - 边界校验器
// ==========================================
// 职责: 把 UI 侧行键 ("item_123" 等拖拽库合成键) 显式解析为领域任务ID
// 红线: UI 合成键不得渗入业务逻辑; 解析只发生在本边界层,
//       解析失败返回类型化错误, 绝不做隐式字符串切片
// ==========================================

use crate::api::error::{ApiError, ApiResult};

/// 领域任务ID (已通过边界校验)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainTaskId(String);

impl DomainTaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for DomainTaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UI 拖拽库为行键加的前缀
const UI_ROW_KEY_PREFIX: &str = "item_";

/// 解析 UI 侧任务引用
///
/// 接受两种形式:
/// - 裸领域ID: "3fa85f64-..."
/// - UI 行键:  "item_3fa85f64-..."
///
/// # 返回
/// - `Err(InvalidInput)`: 空引用、纯前缀、含空白字符
pub fn parse_task_ref(raw: &str) -> ApiResult<DomainTaskId> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput("任务引用为空".to_string()));
    }

    let id = trimmed.strip_prefix(UI_ROW_KEY_PREFIX).unwrap_or(trimmed);

    if id.is_empty() {
        return Err(ApiError::InvalidInput(format!(
            "任务引用只有前缀, 缺少ID: {}",
            raw
        )));
    }

    if id.chars().any(char::is_whitespace) {
        return Err(ApiError::InvalidInput(format!(
            "任务引用含空白字符: {}",
            raw
        )));
    }

    Ok(DomainTaskId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id_passes_through() {
        let id = parse_task_ref("abc-123").unwrap();
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_ui_row_key_is_stripped() {
        let id = parse_task_ref("item_abc-123").unwrap();
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_empty_and_prefix_only_rejected() {
        assert!(parse_task_ref("").is_err());
        assert!(parse_task_ref("   ").is_err());
        assert!(parse_task_ref("item_").is_err());
    }

    #[test]
    fn test_whitespace_rejected() {
        assert!(parse_task_ref("item_abc 123").is_err());
    }
}
