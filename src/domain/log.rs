//! 日志事件模型
//!
//! 命令输出经日志中心按 correlation id 广播给订阅者

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 输出流
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

/// 日志行
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub content: String,
}

impl LogLine {
    /// 创建新日志行
    pub fn new(stream: LogStream, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            content: content.into(),
        }
    }

    /// 创建 stdout 日志行
    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new(LogStream::Stdout, content)
    }

    /// 创建 stderr 日志行
    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new(LogStream::Stderr, content)
    }
}

/// 日志事件
///
/// 进程启动发送 `Open`，每行输出发送 `Data`，进程退出发送 `Close`。
/// 外部订阅者也可以发送 `Close` 来结束跟随中的日志命令。
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    Open,
    Data(LogLine),
    Close,
}

impl LogEvent {
    pub fn is_close(&self) -> bool {
        matches!(self, LogEvent::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_creation() {
        let line = LogLine::stdout("Hello");
        assert_eq!(line.stream, LogStream::Stdout);
        assert_eq!(line.content, "Hello");

        let line = LogLine::stderr("Error");
        assert_eq!(line.stream.as_str(), "stderr");
    }

    #[test]
    fn test_log_event_json_shape() {
        let json = serde_json::to_value(LogEvent::Data(LogLine::stderr("boom"))).unwrap();
        assert_eq!(json["event"], "data");
        assert_eq!(json["stream"], "stderr");
        assert_eq!(json["content"], "boom");

        let json = serde_json::to_value(LogEvent::Close).unwrap();
        assert_eq!(json["event"], "close");
    }
}
