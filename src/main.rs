use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deadline_notifier::config::{AppConfig, CliConfig, FileConfig, GeneratorSettings};
use deadline_notifier::generation::{
    GenerationTrigger, NotificationGenerator, RpcNotificationGenerator,
};
use deadline_notifier::server::{metrics, run_metrics_server, run_server, RequestsLoggingLevel};
use deadline_notifier::SqliteStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite notification database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3010)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Bearer token required on the generation routes.
    #[clap(long)]
    pub cron_secret: Option<String>,

    /// Seconds between in-process generation runs. Set to 0 to disable.
    #[clap(long, default_value_t = 0)]
    pub generation_interval_secs: u64,

    /// How many hours ahead of a deadline a "due" notification is generated.
    #[clap(long, default_value_t = 24)]
    pub due_window_hours: u64,

    /// Base URL of a REST gateway exposing the generation procedure. When set,
    /// the local database is not used.
    #[clap(long)]
    pub generator_url: Option<String>,

    /// Name of the remote generation procedure.
    #[clap(long)]
    pub generator_procedure: Option<String>,

    /// API key for the REST gateway.
    #[clap(long)]
    pub generator_api_key: Option<String>,

    /// Timeout in seconds for remote generator requests.
    #[clap(long, default_value_t = 30)]
    pub generator_timeout_sec: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            cron_secret: self.cron_secret.clone(),
            generation_interval_secs: self.generation_interval_secs,
            due_window_hours: self.due_window_hours,
            generator_url: self.generator_url.clone(),
            generator_procedure: self.generator_procedure.clone(),
            generator_api_key: self.generator_api_key.clone(),
            generator_timeout_sec: self.generator_timeout_sec,
        }
    }
}

fn make_generator(settings: &GeneratorSettings) -> Result<Arc<dyn NotificationGenerator>> {
    match settings {
        GeneratorSettings::Sqlite {
            db_path,
            due_window,
        } => {
            info!("Opening SQLite notification database at {:?}...", db_path);
            Ok(Arc::new(SqliteStore::new(db_path, *due_window)?))
        }
        GeneratorSettings::Rpc {
            base_url,
            procedure,
            api_key,
            timeout_sec,
        } => {
            info!("Relaying generation to {}/rpc/{}", base_url, procedure);
            Ok(Arc::new(RpcNotificationGenerator::new(
                base_url.clone(),
                procedure.clone(),
                api_key.clone(),
                *timeout_sec,
            )?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let trigger = GenerationTrigger::new(make_generator(&config.generator)?);
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down...");
            shutdown.cancel();
        }
    });

    let metrics_task = tokio::spawn(run_metrics_server(config.metrics_port, shutdown.clone()));

    let periodic_task = config.generation_interval.map(|interval| {
        let trigger = trigger.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { trigger.run_periodic(interval, shutdown).await })
    });

    info!(
        "Push handler at {} (scope {}), relay key {}",
        config.push.config.handler_path,
        config.push.config.scope,
        if config.push.relay_public_key.is_some() { "configured" } else { "missing" }
    );
    let result = run_server(config.server_config(), trigger, shutdown.clone()).await;
    shutdown.cancel();

    if let Some(task) = periodic_task {
        let _ = task.await;
    }
    match metrics_task.await {
        Ok(Err(e)) => error!("Metrics server failed: {:#}", e),
        Err(e) => error!("Metrics server task panicked: {}", e),
        Ok(Ok(())) => {}
    }

    result
}
