//! Service log following
//!
//! A follower streams `service logs -f` into a log channel. It stops when a
//! Close event shows up on that channel, whether emitted by the follower
//! itself or by another producer sharing the id.

use tokio_util::sync::CancellationToken;

use crate::error::HornetResult;
use crate::infra::docker;

use super::SwarmEngine;

impl SwarmEngine {
    /// Follow the logs of one tracked service into `log_id`.
    /// Returns how many listeners were already on `log_id`.
    pub async fn emit_service_logs(&self, name: &str, log_id: &str) -> HornetResult<usize> {
        self.registry
            .services
            .ensure_present(&[name.to_string()])
            .await?;
        Ok(self.follow_logs(name, log_id).await)
    }

    /// Follow every tracked service into the same `log_id`.
    /// Returns how many followers were started.
    pub async fn emit_services_logs(&self, log_id: &str) -> usize {
        let names = self.registry.services.names().await;
        for name in &names {
            self.follow_logs(name, log_id).await;
        }
        names.len()
    }

    async fn follow_logs(&self, name: &str, log_id: &str) -> usize {
        // Subscribe before the process starts so its Close cannot be missed
        let mut subscription = self.log_hub.subscribe(log_id).await;

        // The follower's own subscription keeps every emit delivered, so the
        // missing-listener check happens here instead of per line
        let listeners = self
            .log_hub
            .subscriber_count(log_id)
            .await
            .saturating_sub(1);
        if listeners == 0 {
            tracing::warn!(log_id = %log_id, service = %name, "No listener for log id");
        }

        let cancel = CancellationToken::new();
        let request = self
            .docker(docker::service_logs_follow(name))
            .streaming(Some(log_id))
            .without_capture();
        let executor = self.executor.clone();
        let follower_cancel = cancel.clone();
        let follower =
            tokio::spawn(async move { executor.execute(request, follower_cancel).await });

        let service = name.to_string();
        tracing::info!(service = %service, log_id = %log_id, "Following service logs");

        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if event.is_close() {
                    break;
                }
            }

            cancel.cancel();
            subscription.unsubscribe().await;

            match follower.await {
                Ok(output) => tracing::debug!(
                    service = %service,
                    outcome = ?output.outcome,
                    "Log follower stopped"
                ),
                Err(e) => {
                    tracing::warn!(service = %service, error = %e, "Log follower task failed")
                }
            }
        });

        listeners
    }
}
