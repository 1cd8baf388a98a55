mod file_config;

pub use file_config::{FileConfig, PushFileConfig};

use crate::push::{decode_relay_key, PushConfig};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GENERATOR_PROCEDURE: &str = "generate_deadline_notifications";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub cron_secret: Option<String>,
    pub generation_interval_secs: u64,
    pub due_window_hours: u64,
    pub generator_url: Option<String>,
    pub generator_procedure: Option<String>,
    pub generator_api_key: Option<String>,
    pub generator_timeout_sec: u64,
}

/// Where the trigger sends generation calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorSettings {
    /// Local SQLite database acting as the upstream generator.
    Sqlite { db_path: PathBuf, due_window: Duration },
    /// Remote stored procedure behind a REST gateway.
    Rpc {
        base_url: String,
        procedure: String,
        api_key: Option<String>,
        timeout_sec: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PushSettings {
    pub config: PushConfig,
    pub relay_public_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub cron_secret: Option<String>,
    /// `None` disables the in-process periodic caller.
    pub generation_interval: Option<Duration>,
    pub generator: GeneratorSettings,
    pub push: PushSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let cron_secret = file
            .cron_secret
            .or_else(|| cli.cron_secret.clone())
            .filter(|s| !s.is_empty());

        let interval_secs = file
            .generation_interval_secs
            .unwrap_or(cli.generation_interval_secs);
        let generation_interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

        let generator_url = file
            .generator_url
            .or_else(|| cli.generator_url.clone());

        let generator = match generator_url {
            Some(base_url) => GeneratorSettings::Rpc {
                base_url,
                procedure: file
                    .generator_procedure
                    .or_else(|| cli.generator_procedure.clone())
                    .unwrap_or_else(|| DEFAULT_GENERATOR_PROCEDURE.to_string()),
                api_key: file
                    .generator_api_key
                    .or_else(|| cli.generator_api_key.clone()),
                timeout_sec: file
                    .generator_timeout_sec
                    .unwrap_or(cli.generator_timeout_sec),
            },
            None => {
                let db_path = file
                    .db_path
                    .map(PathBuf::from)
                    .or_else(|| cli.db_path.clone())
                    .ok_or_else(|| {
                        anyhow!("db_path must be specified via --db-path or in config file")
                    })?;

                if let Some(parent) = db_path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.is_dir() {
                        bail!("Database directory does not exist: {:?}", parent);
                    }
                }

                let due_window_hours = file.due_window_hours.unwrap_or(cli.due_window_hours);
                GeneratorSettings::Sqlite {
                    db_path,
                    due_window: Duration::from_secs(due_window_hours * 60 * 60),
                }
            }
        };

        let push_file = file.push.unwrap_or_default();
        let defaults = PushConfig::default();
        let relay_public_key = push_file.relay_public_key;
        if let Some(key) = &relay_public_key {
            // Fail at startup rather than on the first subscribe.
            decode_relay_key(key).map_err(|e| anyhow!("Invalid push.relay_public_key: {}", e))?;
        }
        let push = PushSettings {
            config: PushConfig {
                handler_path: push_file.handler_path.unwrap_or(defaults.handler_path),
                scope: push_file.scope.unwrap_or(defaults.scope),
            },
            relay_public_key,
        };

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            cron_secret,
            generation_interval,
            generator,
            push,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            cron_secret: self.cron_secret.clone(),
            push: self.push.config.clone(),
            relay_public_key: self.push.relay_public_key.clone(),
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
