//! Import of networks and images that already exist in the runtime

use serde::Serialize;

use crate::domain::Image;
use crate::error::HornetResult;
use crate::infra::docker;

use super::SwarmEngine;

/// Names imported by one discovery pass
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Discovered {
    pub networks: Vec<String>,
    pub images: Vec<String>,
}

impl SwarmEngine {
    /// Track runtime images and user networks without issuing any
    /// provisioning command. Names already tracked are left untouched.
    pub async fn discover_runtime(&self, log_id: Option<&str>) -> HornetResult<Discovered> {
        let mut discovered = Discovered::default();

        let stdout = self
            .try_docker(docker::image_list(), "Failed to list images".to_string(), log_id)
            .await?;
        for (name, repository) in docker::parse_image_list(&stdout, &self.registry_address) {
            if self
                .registry
                .images
                .insert_if_absent(Image::public(name.clone(), repository))
                .await
            {
                discovered.images.push(name);
            }
        }

        let stdout = self
            .try_docker(docker::network_list(), "Failed to list networks".to_string(), log_id)
            .await?;
        for network in docker::parse_network_list(&stdout) {
            let name = network.name.clone();
            if self.registry.networks.insert_if_absent(network).await {
                discovered.networks.push(name);
            }
        }

        tracing::info!(
            images = discovered.images.len(),
            networks = discovered.networks.len(),
            "Discovered runtime resources"
        );
        Ok(discovered)
    }
}
