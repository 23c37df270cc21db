//! 输入校验
//!
//! 收集所有违反的约束，而不是遇到第一个就返回

use serde::Serialize;
use std::fmt;

/// 端口上限
pub const MAX_PORT: u32 = 65535;

/// 单个字段的校验失败
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

/// 校验错误集合
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条违反的约束
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            message: message.into(),
        });
    }

    /// 非空字符串检查
    pub fn require_non_empty(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.push(field, "must not be empty");
        }
    }

    /// 端口范围检查 (0-65535)
    pub fn require_port(&mut self, field: &str, value: u32) {
        if value > MAX_PORT {
            self.push(field, format!("port {} is outside 0-{}", value, MAX_PORT));
        }
    }

    /// 为嵌套结构的违规项加上前缀
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for v in other.violations {
            self.push(format!("{}.{}", prefix, v.field), v.message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// 没有违规时返回 Ok(value)
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// 去掉首尾空白
pub(crate) fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

/// 可选字符串：去空白后为空视为未设置
pub(crate) fn trimmed_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_every_violation() {
        let mut errors = ValidationErrors::new();
        errors.require_non_empty("name", "");
        errors.require_port("expose.publish", 70000);
        errors.require_port("expose.target", 80);

        assert_eq!(errors.violations().len(), 2);
        assert_eq!(errors.violations()[0].field, "name");
        assert!(errors.to_string().contains("expose.publish"));
    }

    #[test]
    fn test_merge_prefixed() {
        let mut inner = ValidationErrors::new();
        inner.require_non_empty("dockerfile", "");

        let mut outer = ValidationErrors::new();
        outer.merge_prefixed("build", inner);
        assert_eq!(outer.violations()[0].field, "build.dockerfile");
    }

    #[test]
    fn test_trimmed_opt() {
        assert_eq!(trimmed_opt(Some("  ")), None);
        assert_eq!(trimmed_opt(Some(" main ")), Some("main".to_string()));
        assert_eq!(trimmed_opt(None), None);
    }
}
