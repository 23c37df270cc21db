//! 日志通道管理
//!
//! 按 correlation id 管理日志广播通道。订阅返回 `LogSubscription` 句柄，
//! 通过句柄显式退订；没有订阅者的通道会被回收。

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::domain::LogEvent;

/// 日志通道容量
const LOG_CHANNEL_CAPACITY: usize = 256;

/// 日志通道信息
struct LogChannel {
    /// 广播发送者
    sender: broadcast::Sender<LogEvent>,
    /// 创建时间
    created_at: DateTime<Utc>,
}

type Channels = Arc<RwLock<HashMap<String, LogChannel>>>;

/// 日志中心
pub struct LogHub {
    /// 通道映射 (log_id -> LogChannel)
    channels: Channels,
}

impl LogHub {
    /// 创建新的日志中心
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 订阅日志通道，通道不存在时创建
    pub async fn subscribe(&self, log_id: &str) -> LogSubscription {
        let mut channels = self.channels.write().await;

        let receiver = match channels.get(log_id) {
            Some(channel) => channel.sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(LOG_CHANNEL_CAPACITY);
                channels.insert(
                    log_id.to_string(),
                    LogChannel {
                        sender,
                        created_at: Utc::now(),
                    },
                );
                receiver
            }
        };

        LogSubscription {
            log_id: log_id.to_string(),
            receiver,
            channels: self.channels.clone(),
        }
    }

    /// 发送事件
    ///
    /// 返回是否至少有一个订阅者收到
    pub async fn emit(&self, log_id: &str, event: LogEvent) -> bool {
        let channels = self.channels.read().await;
        match channels.get(log_id) {
            Some(channel) => channel.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// 当前订阅者数量
    pub async fn subscriber_count(&self, log_id: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(log_id).map_or(0, |c| c.sender.receiver_count())
    }

    /// 检查通道是否存在
    pub async fn exists(&self, log_id: &str) -> bool {
        let channels = self.channels.read().await;
        channels.contains_key(log_id)
    }

    /// 清理没有活跃订阅者的通道
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, channel| channel.sender.receiver_count() > 0);
    }

    /// 清理创建时间超过指定时长且没有订阅者的通道
    pub async fn cleanup_expired(&self, max_age_hours: i64) {
        let now = Utc::now();
        let mut channels = self.channels.write().await;

        channels.retain(|_, channel| {
            let age = now - channel.created_at;
            age.num_hours() < max_age_hours || channel.sender.receiver_count() > 0
        });
    }

    /// 获取通道数量
    pub async fn count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.len()
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 订阅句柄
pub struct LogSubscription {
    log_id: String,
    receiver: broadcast::Receiver<LogEvent>,
    channels: Channels,
}

impl LogSubscription {
    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// 接收下一个事件
    ///
    /// 落后时跳过丢失的事件；通道关闭返回 None
    pub async fn recv(&mut self) -> Option<LogEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(log_id = %self.log_id, skipped, "Log subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// 退订，最后一个订阅者离开时移除通道
    pub async fn unsubscribe(self) {
        let LogSubscription {
            log_id,
            receiver,
            channels,
        } = self;
        drop(receiver);

        let mut channels = channels.write().await;
        if channels
            .get(&log_id)
            .is_some_and(|c| c.sender.receiver_count() == 0)
        {
            channels.remove(&log_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogLine;

    #[tokio::test]
    async fn test_subscribe_and_emit() {
        let hub = LogHub::new();

        let mut subscription = hub.subscribe("req-1").await;
        assert!(hub.exists("req-1").await);

        assert!(hub.emit("req-1", LogEvent::Data(LogLine::stdout("Hello"))).await);

        match subscription.recv().await {
            Some(LogEvent::Data(line)) => assert_eq!(line.content, "Hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_without_listener_reports_false() {
        let hub = LogHub::new();
        assert!(!hub.emit("nobody", LogEvent::Open).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_channel() {
        let hub = LogHub::new();

        let first = hub.subscribe("req-1").await;
        let second = hub.subscribe("req-1").await;
        assert_eq!(hub.subscriber_count("req-1").await, 2);

        first.unsubscribe().await;
        assert!(hub.exists("req-1").await);
        assert_eq!(hub.subscriber_count("req-1").await, 1);

        second.unsubscribe().await;
        assert!(!hub.exists("req-1").await);
        assert!(!hub.emit("req-1", LogEvent::Close).await);
    }

    #[tokio::test]
    async fn test_cleanup_preserves_active_subscribers() {
        let hub = LogHub::new();

        let _active = hub.subscribe("req-1").await;
        drop(hub.subscribe("req-2").await);

        hub.cleanup().await;

        assert!(hub.exists("req-1").await);
        assert!(!hub.exists("req-2").await);
        assert_eq!(hub.count().await, 1);
    }
}
