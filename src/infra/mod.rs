//! 基础设施模块
//!
//! 封装外部依赖（命令执行、Docker CLI 参数、构建目录）

pub mod build_context;
pub mod command;
pub mod docker;

pub use build_context::{BuildContext, BuildContextManager};
pub use command::{CommandExecutor, CommandOutput, CommandRequest, ExitOutcome, ProcessExecutor};
