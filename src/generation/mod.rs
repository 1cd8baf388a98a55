//! Generation trigger: relays calls to the upstream notification generator.
//!
//! The upstream procedure is idempotent; this module never deduplicates,
//! retries or rewrites its errors.

mod rpc;

pub use rpc::RpcNotificationGenerator;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::server::metrics;

/// What the upstream generator reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// Number of notifications created, when the upstream reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<u64>,
}

/// Upstream procedure that materializes notifications from deadline data.
/// Must be safe to call repeatedly and concurrently.
#[async_trait]
pub trait NotificationGenerator: Send + Sync {
    async fn generate(&self) -> Result<GenerationOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// Error text reported by the upstream generator, unchanged.
    #[error("{0}")]
    Upstream(String),
}

/// Stateless relay in front of a `NotificationGenerator`.
#[derive(Clone)]
pub struct GenerationTrigger {
    generator: Arc<dyn NotificationGenerator>,
}

impl GenerationTrigger {
    pub fn new(generator: Arc<dyn NotificationGenerator>) -> Self {
        Self { generator }
    }

    pub async fn generate(&self) -> Result<GenerationOutcome, TriggerError> {
        match self.generator.generate().await {
            Ok(outcome) => {
                debug!("Notification generation succeeded: {:?}", outcome);
                metrics::record_generation_run("success");
                Ok(outcome)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!("Notification generation failed: {}", message);
                metrics::record_generation_run("failure");
                Err(TriggerError::Upstream(message))
            }
        }
    }

    /// Invoke the trigger every `interval` until `shutdown` fires.
    pub async fn run_periodic(&self, interval: Duration, shutdown: CancellationToken) {
        info!(
            "Periodic notification generation every {}s",
            interval.as_secs()
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are already logged and counted by `generate`.
                    let _ = self.generate().await;
                }
                _ = shutdown.cancelled() => {
                    info!("Periodic notification generation stopped");
                    break;
                }
            }
        }
    }
}
