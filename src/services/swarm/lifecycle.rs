//! Whole-swarm lifecycle: runtime probe, swarm mode, local registry,
//! declarative load/dump and teardown.

use futures::future::join_all;

use crate::config::constants::REGISTRY_SERVICE_NAME;
use crate::domain::SwarmConfig;
use crate::error::{HornetError, HornetResult};
use crate::infra::docker;

use super::SwarmEngine;

impl SwarmEngine {
    /// Make sure the runtime CLI answers
    pub(super) async fn probe_runtime(&self) -> HornetResult<()> {
        let output = self.run(self.docker(docker::version())).await;
        if !output.success() {
            let reason = if output.stderr.is_empty() {
                format!("{:?}", output.outcome)
            } else {
                output.stderr.join("\n")
            };
            return Err(HornetError::RuntimeUnavailable(reason));
        }

        tracing::info!(version = %output.stdout.join(" ").trim(), "Container runtime available");
        Ok(())
    }

    /// Leave any existing swarm and initialise a fresh one
    pub(super) async fn init_swarm(&self) -> HornetResult<()> {
        // Not being part of a swarm is fine
        let leave = self.run(self.docker(docker::swarm_leave())).await;
        tracing::debug!(outcome = ?leave.outcome, "Left previous swarm");

        let stdout = self
            .try_docker(docker::swarm_init(), "Failed to init swarm".to_string(), None)
            .await?;

        let Some(token) = docker::parse_join_token(&stdout) else {
            *self.join_token.write().await = None;
            return Err(HornetError::external(
                "Could not establish the swarm's join token",
                &stdout,
            ));
        };

        tracing::info!(join = %token, "Swarm initialized");
        *self.join_token.write().await = Some(token);
        Ok(())
    }

    /// Create the local registry service unless it is already running
    pub(super) async fn ensure_registry(&self) -> HornetResult<()> {
        let inspect = self
            .run(self.docker(docker::service_inspect(REGISTRY_SERVICE_NAME)))
            .await;
        if inspect.success() {
            tracing::debug!(
                registry = %self.registry_address,
                "Registry service already running"
            );
            return Ok(());
        }

        self.try_docker(
            docker::registry_service_create(self.config.local_registry_port),
            "Failed to create registry".to_string(),
            None,
        )
        .await?;

        tracing::info!(registry = %self.registry_address, "Registry service created");
        Ok(())
    }

    /// Snapshot of everything tracked, in the shape `load_swarm_config` accepts
    pub async fn dump_swarm_config(&self) -> SwarmConfig {
        let networks = self.networks().await;
        let images = self.images().await;

        SwarmConfig {
            networks: (!networks.is_empty()).then_some(networks),
            images: (!images.is_empty()).then_some(images),
            services: self.services().await,
        }
    }

    /// Replace the swarm with `config`.
    ///
    /// The whole document is validated before anything is torn down. Networks
    /// and images are provisioned concurrently; services are only attempted
    /// when all of them succeeded.
    pub async fn load_swarm_config(
        &self,
        config: &SwarmConfig,
        log_id: Option<&str>,
    ) -> HornetResult<()> {
        config.validate()?;

        self.clean_swarm(log_id).await?;

        let networks = config
            .networks
            .iter()
            .flatten()
            .map(|network| self.add_network(network, log_id));
        let images = config
            .images
            .iter()
            .flatten()
            .map(|image| self.add_image(image, None, false, log_id));

        let (network_results, image_results) = tokio::join!(join_all(networks), join_all(images));

        let failures: Vec<HornetError> = network_results
            .into_iter()
            .filter_map(Result::err)
            .chain(image_results.into_iter().filter_map(Result::err))
            .collect();
        if let Some(e) = HornetError::batch(failures) {
            tracing::error!(error = %e, "Swarm config load aborted before services");
            return Err(e);
        }

        let service_results = join_all(
            config
                .services
                .iter()
                .map(|service| self.add_service(service, log_id)),
        )
        .await;

        let failures: Vec<HornetError> = service_results
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if let Some(e) = HornetError::batch(failures) {
            return Err(e);
        }

        tracing::info!(
            networks = config.networks.as_ref().map_or(0, Vec::len),
            images = config.images.as_ref().map_or(0, Vec::len),
            services = config.services.len(),
            "Swarm config loaded"
        );
        Ok(())
    }

    /// Remove everything tracked, then restore the swarm and the registry
    /// the engine owns. Every step is attempted; failures are reported
    /// together.
    pub async fn clean_swarm(&self, log_id: Option<&str>) -> HornetResult<()> {
        let mut failures = Vec::new();

        let services = self.registry.services.names().await;
        if let Err(e) = self.remove_services(&services, log_id).await {
            failures.push(e);
        }

        let networks = self.registry.networks.names().await;
        if let Err(e) = self.remove_networks(&networks, log_id).await {
            failures.push(e);
        }

        let images = self.registry.images.names().await;
        if let Err(e) = self.remove_images(&images, log_id).await {
            failures.push(e);
        }

        if self.config.init_swarm {
            if let Err(e) = self.init_swarm().await {
                failures.push(e);
            }
        }

        if !self.config.external_registry() {
            if let Err(e) = self.ensure_registry().await {
                failures.push(e);
            }
        }

        match HornetError::batch(failures) {
            Some(e) => {
                tracing::error!(error = %e, "Swarm cleanup incomplete");
                Err(e)
            }
            None => {
                tracing::info!("Swarm cleaned");
                Ok(())
            }
        }
    }
}
