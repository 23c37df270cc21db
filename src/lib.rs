//! Hornet - Docker Swarm 编排引擎
//!
//! 声明式管理网络、镜像和服务，通过容器运行时 CLI 执行

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

pub use config::EngineConfig;
pub use error::{HornetError, HornetResult};
pub use services::SwarmEngine;
pub use state::{AppState, LogHub};
