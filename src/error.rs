//! 统一错误处理
//!
//! 所有引擎操作返回 `HornetResult<T>`，调用方可通过 `kind()` 区分失败类型

use thiserror::Error;

use crate::domain::ValidationErrors;

/// 引擎错误类型
#[derive(Debug, Error)]
pub enum HornetError {
    /// 输入不合法（字段缺失、端口越界等）
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    /// 名称已被占用
    #[error("{0} already exists")]
    Conflict(String),

    /// 操作的实体未被跟踪
    #[error("{0} not found")]
    NotFound(String),

    /// 运行时命令非零退出
    #[error("{message}\n {stderr}")]
    ExternalCommand { message: String, stderr: String },

    /// 创建超时，进程已终止
    #[error("{0}")]
    Timeout(String),

    /// 超时后的补偿动作无法确认成功
    #[error("{0}")]
    Cleanup(String),

    /// 并发阶段中有一个或多个操作失败
    #[error("{} operation(s) failed: {}", .0.len(), join_messages(.0))]
    Batch(Vec<HornetError>),

    /// 运行时 CLI 不可用
    #[error("Can not access the container runtime: {0}")]
    RuntimeUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn join_messages(errors: &[HornetError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

impl HornetError {
    /// 创建冲突错误
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict(resource.into())
    }

    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建外部命令错误
    pub fn external(message: impl Into<String>, stderr: &[String]) -> Self {
        Self::ExternalCommand {
            message: message.into(),
            stderr: stderr.join("\n"),
        }
    }

    /// 将多个错误合并，只有一个时原样返回
    pub fn batch(mut errors: Vec<HornetError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Batch(errors)),
        }
    }

    /// 错误类型标识
    pub fn kind(&self) -> &'static str {
        match self {
            HornetError::Validation(_) => "validation",
            HornetError::Conflict(_) => "conflict",
            HornetError::NotFound(_) => "not_found",
            HornetError::ExternalCommand { .. } => "external_command",
            HornetError::Timeout(_) => "timeout",
            HornetError::Cleanup(_) => "cleanup",
            HornetError::Batch(_) => "batch",
            HornetError::RuntimeUnavailable(_) => "runtime_unavailable",
            HornetError::Config(_) => "config",
            HornetError::Io(_) => "io",
            HornetError::Serialization(_) => "serialization",
        }
    }
}

impl From<ValidationErrors> for HornetError {
    fn from(errors: ValidationErrors) -> Self {
        HornetError::Validation(errors)
    }
}

/// 便捷类型别名
pub type HornetResult<T> = Result<T, HornetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_error_carries_stderr() {
        let err = HornetError::external(
            "Failed to create network \"main\"",
            &["line one".to_string(), "line two".to_string()],
        );
        assert_eq!(err.kind(), "external_command");
        let text = err.to_string();
        assert!(text.contains("Failed to create network"));
        assert!(text.contains("line one\nline two"));
    }

    #[test]
    fn test_batch_collapses_single_error() {
        assert!(HornetError::batch(Vec::new()).is_none());

        let single = HornetError::batch(vec![HornetError::not_found("Service \"a\"")]).unwrap();
        assert_eq!(single.kind(), "not_found");

        let many = HornetError::batch(vec![
            HornetError::not_found("Service \"a\""),
            HornetError::conflict("Network \"b\""),
        ])
        .unwrap();
        assert_eq!(many.kind(), "batch");
        assert!(many.to_string().starts_with("2 operation(s) failed"));
    }
}
