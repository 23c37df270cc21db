//! 命令执行器
//!
//! 提供统一的命令执行接口，支持：
//! - 按 correlation id 实时流式输出到日志中心
//! - 取消支持（终止进程并保证结果返回）
//! - stdout/stderr 分离捕获
//!
//! 执行结果从不返回错误：启动失败、非零退出、被终止都体现在 `CommandOutput` 中。

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{LogEvent, LogLine, LogStream};
use crate::state::LogHub;

/// 进程退出后等待输出读取完成的最长时间
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 启动失败时使用的退出码
pub const SPAWN_FAILED_EXIT_CODE: i32 = -1;

/// 命令请求
#[derive(Clone, Debug)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    /// 工作目录
    pub work_dir: Option<PathBuf>,
    /// 是否捕获输出
    pub capture: bool,
    /// 流式输出的 correlation id
    pub log_id: Option<String>,
}

impl CommandRequest {
    /// 默认捕获输出，不流式输出
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            work_dir: None,
            capture: true,
            log_id: None,
        }
    }

    pub fn in_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn streaming(mut self, log_id: Option<&str>) -> Self {
        self.log_id = log_id.map(str::to_string);
        self
    }

    pub fn without_capture(mut self) -> Self {
        self.capture = false;
        self
    }

    /// 用于日志的命令行
    pub fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

/// 进程结束方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// 正常退出
    Exited(i32),
    /// 被终止（取消或信号）
    Terminated,
    /// 取消时无法终止进程
    KillFailed(String),
}

/// 命令执行结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    pub outcome: ExitOutcome,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    pub fn exited(code: i32, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            outcome: ExitOutcome::Exited(code),
            stdout,
            stderr,
        }
    }

    pub fn terminated() -> Self {
        Self {
            outcome: ExitOutcome::Terminated,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// 进程被强制终止时为 None
    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            ExitOutcome::Exited(code) => Some(code),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code() == Some(0)
    }
}

/// 命令执行器
///
/// `cancel` 被触发时实现必须终止进程并尽快返回
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: CommandRequest, cancel: CancellationToken) -> CommandOutput;
}

/// 基于子进程的执行器
pub struct ProcessExecutor {
    log_hub: Arc<LogHub>,
    log_commands: bool,
}

impl ProcessExecutor {
    pub fn new(log_hub: Arc<LogHub>, log_commands: bool) -> Self {
        Self {
            log_hub,
            log_commands,
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, request: CommandRequest, cancel: CancellationToken) -> CommandOutput {
        if self.log_commands {
            info!(">>> {}", request.display());
        } else {
            debug!(">>> {}", request.display());
        }

        let piped = request.capture || request.log_id.is_some();

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &request.work_dir {
            command.current_dir(dir);
        }
        if piped {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %request.display(), error = %e, "Failed to spawn command");
                return CommandOutput::exited(
                    SPAWN_FAILED_EXIT_CODE,
                    Vec::new(),
                    vec![format!("Failed to spawn {}: {}", request.program, e)],
                );
            }
        };

        if let Some(log_id) = &request.log_id {
            self.log_hub.emit(log_id, LogEvent::Open).await;
        }

        // 启动 stdout / stderr 读取任务
        let stdout_task = child.stdout.take().map(|out| {
            spawn_reader(out, LogStream::Stdout, self.log_hub.clone(), &request)
        });
        let stderr_task = child.stderr.take().map(|err| {
            spawn_reader(err, LogStream::Stderr, self.log_hub.clone(), &request)
        });

        // 等待进程结束，支持取消
        let outcome = tokio::select! {
            biased;
            status = child.wait() => match status {
                Ok(status) => match status.code() {
                    Some(code) => ExitOutcome::Exited(code),
                    None => ExitOutcome::Terminated,
                },
                Err(e) => {
                    error!(command = %request.display(), error = %e, "Failed to wait for command");
                    ExitOutcome::Exited(SPAWN_FAILED_EXIT_CODE)
                }
            },
            _ = cancel.cancelled() => {
                warn!(command = %request.display(), "Command cancelled, killing process");
                match child.kill().await {
                    Ok(()) => ExitOutcome::Terminated,
                    Err(e) => {
                        error!(command = %request.display(), error = %e, "Failed to kill process");
                        ExitOutcome::KillFailed(e.to_string())
                    }
                }
            }
        };

        // 等待日志读取完成
        let stdout = drain(stdout_task).await;
        let stderr = drain(stderr_task).await;

        if let Some(log_id) = &request.log_id {
            self.log_hub.emit(log_id, LogEvent::Close).await;
        }

        CommandOutput {
            outcome,
            stdout,
            stderr,
        }
    }
}

/// 逐行读取输出，按需捕获并推送到日志中心
fn spawn_reader<R>(
    pipe: R,
    stream: LogStream,
    log_hub: Arc<LogHub>,
    request: &CommandRequest,
) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let capture = request.capture;
    let log_id = request.log_id.clone();

    tokio::spawn(async move {
        let mut captured = Vec::new();
        let mut warned = false;
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();

        // 非 UTF-8 字节按 lossy 解码，读到 EOF 为止
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(stream = stream.as_str(), error = %e, "Failed to read command output");
                    break;
                }
            }
            let line = decode_line(&buf);
            if let Some(id) = &log_id {
                let delivered = log_hub
                    .emit(id, LogEvent::Data(LogLine::new(stream, line.clone())))
                    .await;
                if !delivered && !warned {
                    warn!(log_id = %id, stream = stream.as_str(), "No listener for log id");
                    warned = true;
                }
            }
            if capture {
                captured.push(line);
            }
        }

        captured
    })
}

/// 去掉行尾换行符后 lossy 解码
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// 有限时间内收集读取任务的结果
async fn drain(task: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    let Some(mut task) = task else {
        return Vec::new();
    };

    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut task).await {
        Ok(Ok(lines)) => lines,
        Ok(Err(e)) => {
            warn!(error = %e, "Output reader task failed");
            Vec::new()
        }
        Err(_) => {
            task.abort();
            Vec::new()
        }
    }
}
