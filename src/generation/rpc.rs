//! HTTP client for a remote generation procedure.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{GenerationOutcome, NotificationGenerator};

/// Calls `{base_url}/rpc/{procedure}` on a database REST gateway.
pub struct RpcNotificationGenerator {
    client: reqwest::Client,
    base_url: String,
    procedure: String,
    api_key: Option<String>,
}

impl RpcNotificationGenerator {
    /// # Arguments
    /// * `base_url` - Gateway base URL (e.g., "https://db.example.com/rest/v1")
    /// * `procedure` - Name of the stored procedure to call
    /// * `api_key` - Sent as both `apikey` and bearer token when present
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(
        base_url: String,
        procedure: String,
        api_key: Option<String>,
        timeout_sec: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            procedure,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rpc/{}", self.base_url, self.procedure)
    }
}

/// Procedures may answer with a bare count, `{"generated": n}`, or nothing useful.
fn parse_outcome(body: &str) -> GenerationOutcome {
    let generated = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Number(n)) => n.as_u64(),
        Ok(value) => value.get("generated").and_then(|g| g.as_u64()),
        Err(_) => None,
    };
    GenerationOutcome { generated }
}

#[async_trait]
impl NotificationGenerator for RpcNotificationGenerator {
    async fn generate(&self) -> Result<GenerationOutcome> {
        let mut request = self
            .client
            .post(self.endpoint())
            .json(&serde_json::json!({}));
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach notification generator")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read generator response")?;

        if !status.is_success() {
            if body.trim().is_empty() {
                bail!("Generator returned status {}", status);
            }
            bail!("{}", body);
        }

        Ok(parse_outcome(&body))
    }
}
