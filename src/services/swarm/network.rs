//! Network provisioning

use crate::domain::Network;
use crate::error::HornetResult;
use crate::infra::docker;

use super::SwarmEngine;

impl SwarmEngine {
    /// Create a network and start tracking it
    pub async fn add_network(
        &self,
        network: &Network,
        log_id: Option<&str>,
    ) -> HornetResult<Network> {
        let network = network.validated()?;
        self.registry.networks.ensure_absent(&network.name).await?;

        self.try_docker(
            docker::network_create(&network),
            format!("Failed to create network \"{}\"", network.name),
            log_id,
        )
        .await?;

        self.registry.networks.insert(network.clone()).await;
        tracing::info!(
            network = %network.name,
            driver = network.driver.as_str(),
            "Network created"
        );
        Ok(network)
    }

    pub async fn remove_networks(
        &self,
        names: &[String],
        log_id: Option<&str>,
    ) -> HornetResult<()> {
        self.remove_tracked(
            &self.registry.networks,
            names,
            docker::network_rm(names),
            "networks",
            log_id,
        )
        .await
    }
}
