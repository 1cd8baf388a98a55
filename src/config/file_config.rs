use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub cron_secret: Option<String>,
    pub generation_interval_secs: Option<u64>,
    pub due_window_hours: Option<u64>,

    // Remote generator
    pub generator_url: Option<String>,
    pub generator_procedure: Option<String>,
    pub generator_api_key: Option<String>,
    pub generator_timeout_sec: Option<u64>,

    pub push: Option<PushFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PushFileConfig {
    pub handler_path: Option<String>,
    pub scope: Option<String>,
    /// URL-safe base64 application server key of the relay.
    pub relay_public_key: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
