//! 运行时状态模块
//!
//! 管理应用状态、实体注册表和日志通道

pub mod app_state;
pub mod log_hub;
pub mod registry;

pub use app_state::AppState;
pub use log_hub::{LogHub, LogSubscription};
pub use registry::{Collection, Named, Registry};
