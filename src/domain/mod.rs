//! 领域模型模块
//!
//! 纯数据结构，不依赖 tokio

pub mod log;
pub mod swarm;
pub mod validation;

// Re-exports for convenience
pub use log::{LogEvent, LogLine, LogStream};
pub use swarm::{
    BuildSource, Expose, Image, ImageSource, Network, NetworkDriver, Service, ServiceMode,
    SwarmConfig,
};
pub use validation::{ValidationErrors, Violation};
