//! Service provisioning
//!
//! `service create` runs under a deadline. When the deadline passes the
//! engine first issues a compensating `service rm`, then cancels the create
//! command and waits for it to be torn down. A timed-out service is never
//! tracked.

use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::domain::Service;
use crate::error::{HornetError, HornetResult};
use crate::infra::{docker, ExitOutcome};

use super::SwarmEngine;

impl SwarmEngine {
    /// Create a service with the configured deadline
    pub async fn add_service(
        &self,
        service: &Service,
        log_id: Option<&str>,
    ) -> HornetResult<Service> {
        self.add_service_within(service, self.config.add_service_timeout, log_id)
            .await
    }

    /// Create a service, giving up after `deadline`
    pub async fn add_service_within(
        &self,
        service: &Service,
        deadline: Duration,
        log_id: Option<&str>,
    ) -> HornetResult<Service> {
        let service = service.validated()?;
        self.registry.services.ensure_absent(&service.name).await?;

        let args = docker::service_create(
            &service,
            &self.registry_address,
            self.config.default_network.as_deref(),
        );
        let cancel = CancellationToken::new();
        let create = self
            .executor
            .execute(self.docker(args).streaming(log_id), cancel.clone());
        tokio::pin!(create);

        let completed = tokio::select! {
            biased;
            output = &mut create => Some(output),
            _ = tokio::time::sleep(deadline) => None,
        };

        let Some(output) = completed else {
            tracing::warn!(service = %service.name, ?deadline, "Create service command timed out");

            self.remove_timed_out_service(&service.name).await;

            cancel.cancel();
            let output = create.await;
            return Err(match output.outcome {
                ExitOutcome::KillFailed(reason) => HornetError::Cleanup(format!(
                    "Create service \"{}\" timed out after {:?} and the command could not be killed: {}",
                    service.name, deadline, reason
                )),
                _ => HornetError::Timeout(format!(
                    "Create service \"{}\" timed out after {:?}",
                    service.name, deadline
                )),
            });
        };

        if !output.success() {
            return Err(HornetError::external(
                format!("Failed to create service \"{}\"", service.name),
                &output.stderr,
            ));
        }

        self.registry.services.insert(service.clone()).await;
        tracing::info!(
            service = %service.name,
            image = %service.image,
            mode = service.mode.as_str(),
            "Service created"
        );
        Ok(service)
    }

    /// Best effort; a failure is only logged
    async fn remove_timed_out_service(&self, name: &str) {
        let names = [name.to_string()];
        let output = self.run(self.docker(docker::service_rm(&names))).await;
        if !output.success() {
            tracing::error!(
                service = %name,
                outcome = ?output.outcome,
                stderr = %output.stderr.join("\n"),
                "Failed to remove timed out service"
            );
        }
    }

    pub async fn remove_services(
        &self,
        names: &[String],
        log_id: Option<&str>,
    ) -> HornetResult<()> {
        self.remove_tracked(
            &self.registry.services,
            names,
            docker::service_rm(names),
            "services",
            log_id,
        )
        .await
    }

    /// Force a rolling restart of one tracked service
    pub async fn restart_service(&self, name: &str, log_id: Option<&str>) -> HornetResult<()> {
        self.registry
            .services
            .ensure_present(&[name.to_string()])
            .await?;

        self.try_docker(
            docker::service_update_force(name),
            format!("Failed to restart service \"{}\"", name),
            log_id,
        )
        .await?;

        tracing::info!(service = %name, "Service restarted");
        Ok(())
    }

    /// Restart every tracked service concurrently
    pub async fn restart_swarm(&self, log_id: Option<&str>) -> HornetResult<()> {
        let names = self.registry.services.names().await;
        let results = join_all(names.iter().map(|name| self.restart_service(name, log_id))).await;

        let failures: Vec<HornetError> = results.into_iter().filter_map(Result::err).collect();
        match HornetError::batch(failures) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
