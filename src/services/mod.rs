//! 服务层模块
//!
//! 包含核心编排逻辑

pub mod swarm;

pub use swarm::{Discovered, SwarmEngine};
