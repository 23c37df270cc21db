//! Shared fixtures: a scripted command executor and engine builders

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use hornet::domain::{LogEvent, LogLine};
use hornet::infra::{CommandExecutor, CommandOutput, CommandRequest, ExitOutcome};
use hornet::{EngineConfig, LogHub, SwarmEngine};

/// Canned reaction to commands whose args start with `prefix`
#[derive(Clone, Debug)]
pub struct Rule {
    prefix: Vec<String>,
    exit_code: i32,
    stdout: Vec<String>,
    stderr: Vec<String>,
    delay: Option<Duration>,
    kill_fails: bool,
}

impl Rule {
    pub fn on(prefix: &[&str]) -> Self {
        Self {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            delay: None,
            kill_fails: false,
        }
    }

    pub fn fail(mut self, stderr: &str) -> Self {
        self.exit_code = 1;
        self.stderr = vec![stderr.to_string()];
        self
    }

    pub fn stdout(mut self, lines: &[&str]) -> Self {
        self.stdout = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Run until cancelled or `delay` passes
    pub fn hang(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cancellation cannot kill the command
    pub fn unkillable(mut self) -> Self {
        self.kill_fails = true;
        self
    }

    fn matches(&self, request: &CommandRequest) -> bool {
        request.args.len() >= self.prefix.len()
            && request.args[..self.prefix.len()] == self.prefix[..]
    }
}

/// Executor that never spawns a process. Unmatched commands succeed with no output.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandRequest>>,
    cancelled: Mutex<Vec<Vec<String>>>,
    log_hub: Option<Arc<LogHub>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit Open/Data/Close for streaming requests like the process executor
    pub fn with_log_hub(log_hub: Arc<LogHub>) -> Self {
        Self {
            log_hub: Some(log_hub),
            ..Self::default()
        }
    }

    /// Later rules take precedence
    pub fn rule(&self, rule: Rule) {
        self.rules.lock().unwrap().push(rule);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.args.clone())
            .collect()
    }

    /// Calls whose args start with `prefix`
    pub fn calls_to(&self, prefix: &[&str]) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| args.len() >= prefix.len() && args[..prefix.len()] == *prefix)
            .collect()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<Vec<String>> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn find_rule(&self, request: &CommandRequest) -> Option<Rule> {
        let rules = self.rules.lock().unwrap();
        rules.iter().rev().find(|r| r.matches(request)).cloned()
    }

    async fn emit(&self, request: &CommandRequest, event: LogEvent) {
        if let (Some(hub), Some(log_id)) = (&self.log_hub, &request.log_id) {
            hub.emit(log_id, event).await;
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, request: CommandRequest, cancel: CancellationToken) -> CommandOutput {
        self.calls.lock().unwrap().push(request.clone());
        let rule = self.find_rule(&request);

        self.emit(&request, LogEvent::Open).await;

        if let Some(delay) = rule.as_ref().and_then(|r| r.delay) {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancelled.lock().unwrap().push(request.args.clone());
                    self.emit(&request, LogEvent::Close).await;
                    let kill_fails = rule.as_ref().is_some_and(|r| r.kill_fails);
                    return CommandOutput {
                        outcome: if kill_fails {
                            ExitOutcome::KillFailed("operation not permitted".to_string())
                        } else {
                            ExitOutcome::Terminated
                        },
                        stdout: Vec::new(),
                        stderr: Vec::new(),
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let output = match rule {
            Some(rule) => CommandOutput::exited(rule.exit_code, rule.stdout, rule.stderr),
            None => CommandOutput::exited(0, Vec::new(), Vec::new()),
        };
        for line in &output.stdout {
            self.emit(&request, LogEvent::Data(LogLine::stdout(line.clone())))
                .await;
        }
        self.emit(&request, LogEvent::Close).await;
        output
    }
}

/// Config that needs no runtime side effects beyond what the executor scripts
pub fn test_config(build_root: &std::path::Path) -> EngineConfig {
    EngineConfig {
        discover_runtime: false,
        registry: Some("reg.local:5000".to_string()),
        build_root: build_root.to_path_buf(),
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub engine: SwarmEngine,
    pub executor: Arc<ScriptedExecutor>,
    pub log_hub: Arc<LogHub>,
    pub build_root: tempfile::TempDir,
}

/// Engine built without start-up commands
pub fn harness() -> Harness {
    harness_with(|_| {})
}

pub fn harness_with(configure: impl FnOnce(&mut EngineConfig)) -> Harness {
    let build_root = tempfile::tempdir().unwrap();
    let mut config = test_config(build_root.path());
    configure(&mut config);

    let log_hub = Arc::new(LogHub::new());
    let executor = Arc::new(ScriptedExecutor::with_log_hub(log_hub.clone()));
    let engine = SwarmEngine::new(config, executor.clone(), log_hub.clone()).unwrap();

    Harness {
        engine,
        executor,
        log_hub,
        build_root,
    }
}
