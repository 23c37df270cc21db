//! Swarm orchestration engine
//!
//! `SwarmEngine` validates entity definitions, drives the runtime CLI through
//! a `CommandExecutor` and records what was provisioned in the `Registry`.
//! The registry is only written after the corresponding command succeeded.

mod discovery;
mod image;
mod lifecycle;
mod logs;
mod network;
mod service;

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{Image, Network, Service};
use crate::error::{HornetError, HornetResult};
use crate::infra::{
    BuildContext, BuildContextManager, CommandExecutor, CommandOutput, CommandRequest,
    ExitOutcome,
};
use crate::state::registry::{Collection, Named};
use crate::state::{LogHub, Registry};

pub use discovery::Discovered;

/// The orchestration facade
pub struct SwarmEngine {
    config: EngineConfig,
    registry_address: String,
    registry: Registry,
    executor: Arc<dyn CommandExecutor>,
    log_hub: Arc<LogHub>,
    builds: BuildContextManager,
    join_token: RwLock<Option<String>>,
}

impl SwarmEngine {
    /// Build an engine without touching the runtime
    pub fn new(
        config: EngineConfig,
        executor: Arc<dyn CommandExecutor>,
        log_hub: Arc<LogHub>,
    ) -> HornetResult<Self> {
        config.validate().map_err(HornetError::Config)?;

        let builds = BuildContextManager::new(
            config.build_root.clone(),
            config.docker_bin.clone(),
            executor.clone(),
        );

        Ok(Self {
            registry_address: config.registry_address(),
            config,
            registry: Registry::new(),
            executor,
            log_hub,
            builds,
            join_token: RwLock::new(None),
        })
    }

    /// Build an engine and prepare the runtime: probe the CLI, take over
    /// swarm mode if configured, provide the local registry and import what
    /// already exists in the runtime.
    pub async fn start(
        config: EngineConfig,
        executor: Arc<dyn CommandExecutor>,
        log_hub: Arc<LogHub>,
    ) -> HornetResult<Self> {
        let engine = Self::new(config, executor, log_hub)?;

        engine.probe_runtime().await?;

        if engine.config.init_swarm {
            engine.init_swarm().await?;
        }

        if !engine.config.external_registry() {
            if let Err(e) = engine.ensure_registry().await {
                tracing::error!(error = %e, "Failed to create registry");
            }
        }

        if engine.config.discover_runtime {
            if let Err(e) = engine.discover_runtime(None).await {
                tracing::error!(error = %e, "Failed to discover Docker runtime");
            }
        }

        tracing::info!(
            registry = %engine.registry_address,
            init_swarm = engine.config.init_swarm,
            default_network = ?engine.config.default_network,
            "Swarm engine started"
        );

        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Address images are tagged against and pushed to
    pub fn registry_address(&self) -> &str {
        &self.registry_address
    }

    /// Join command printed by `swarm init`, when the engine owns swarm mode
    pub async fn join_token(&self) -> Option<String> {
        self.join_token.read().await.clone()
    }

    pub fn log_hub(&self) -> &Arc<LogHub> {
        &self.log_hub
    }

    // ========== Reads ==========

    pub async fn networks(&self) -> Vec<Network> {
        self.registry.networks.list().await
    }

    pub async fn network(&self, name: &str) -> Option<Network> {
        self.registry.networks.get(name).await
    }

    pub async fn services(&self) -> Vec<Service> {
        self.registry.services.list().await
    }

    pub async fn service(&self, name: &str) -> Option<Service> {
        self.registry.services.get(name).await
    }

    pub async fn images(&self) -> Vec<Image> {
        self.registry.images.list().await
    }

    pub async fn image(&self, name: &str) -> Option<Image> {
        self.registry.images.get(name).await
    }

    // ========== Build contexts ==========

    /// Allocate a staging directory for an upcoming build
    pub async fn create_build_context(&self) -> HornetResult<BuildContext> {
        self.builds.create().await
    }

    /// Handle for a context allocated earlier
    pub fn build_context(&self, id: Uuid) -> BuildContext {
        self.builds.open(id)
    }

    // ========== Command helpers ==========

    fn docker(&self, args: Vec<String>) -> CommandRequest {
        CommandRequest::new(self.config.docker_bin.clone(), args)
    }

    async fn run(&self, request: CommandRequest) -> CommandOutput {
        self.executor
            .execute(request, CancellationToken::new())
            .await
    }

    /// Run a docker command, failing with `message` on a non-zero exit.
    /// Returns captured stdout.
    async fn try_docker(
        &self,
        args: Vec<String>,
        message: String,
        log_id: Option<&str>,
    ) -> HornetResult<Vec<String>> {
        let output = self.run(self.docker(args).streaming(log_id)).await;
        match output.outcome {
            ExitOutcome::Exited(0) => Ok(output.stdout),
            ExitOutcome::Exited(_) => Err(HornetError::external(message, &output.stderr)),
            ExitOutcome::Terminated | ExitOutcome::KillFailed(_) => Err(HornetError::external(
                message,
                &["command was terminated before it exited".to_string()],
            )),
        }
    }

    /// Batched removal shared by networks, services and images.
    ///
    /// Every name must be tracked before anything runs. After the command
    /// completes the names are evicted whatever its exit code; a failed
    /// command is still reported.
    async fn remove_tracked<T: Named + Clone>(
        &self,
        collection: &Collection<T>,
        names: &[String],
        args: Vec<String>,
        label: &str,
        log_id: Option<&str>,
    ) -> HornetResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        collection.ensure_present(names).await?;

        let output = self.run(self.docker(args).streaming(log_id)).await;
        collection.remove_all(names).await;

        tracing::info!(names = ?names, exit_code = ?output.exit_code(), "Removed {}", label);

        if !output.success() {
            return Err(HornetError::external(
                format!("Failed to remove {} [{}]", label, names.join(", ")),
                &output.stderr,
            ));
        }
        Ok(())
    }
}
