//! Downstream handoff to the packaging service.

use std::time::Duration;

use tracing::info;

use framex_models::HandoffDescriptor;

use crate::error::{WorkerError, WorkerResult};

/// Client for the packaging service that bundles extracted frames.
#[derive(Debug)]
pub struct PackagerClient {
    http: reqwest::Client,
    base_url: String,
}

impl PackagerClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let base_url = std::env::var("PACKAGER_SERVICE_URL")
            .map_err(|_| WorkerError::config_error("PACKAGER_SERVICE_URL not set"))?;
        Ok(Self::new(base_url))
    }

    /// Forward a result descriptor for packaging.
    ///
    /// Pure pass-through: no branching, no state. The job is already
    /// COMPLETED when this runs; failures here belong to the dispatch
    /// layer, not the pipeline.
    pub async fn forward(&self, descriptor: &HandoffDescriptor) -> WorkerResult<serde_json::Value> {
        let url = format!("{}/schedule", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(descriptor)
            .send()
            .await
            .map_err(|e| WorkerError::handoff_failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| WorkerError::handoff_failed(e.to_string()))?;

        let ack: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WorkerError::handoff_failed(e.to_string()))?;

        info!(job_ref = %descriptor.job_ref, "Forwarded result to packager");
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_requires_base_url() {
        std::env::remove_var("PACKAGER_SERVICE_URL");
        let err = PackagerClient::from_env().unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }
}
