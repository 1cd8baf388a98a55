//! Common test infrastructure
//!
//! Spawns an isolated notifier server backed by a temporary SQLite database.

#![allow(dead_code)]

use deadline_notifier::generation::GenerationTrigger;
use deadline_notifier::server::{make_app, RequestsLoggingLevel, ServerConfig};
use deadline_notifier::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const OWNER_ID: &str = "student-1";
pub const CRON_SECRET: &str = "cron-secret";
pub const HOUR_MS: i64 = 60 * 60 * 1000;

const SERVER_READY_TIMEOUT_MS: u64 = 5000;
const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// SQLite store in a temp dir that lives as long as the struct.
pub struct TestDb {
    pub store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteStore::new(
            temp_dir.path().join("notifications.db"),
            Duration::from_secs(24 * 60 * 60),
        )
        .expect("Failed to open notification database");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }
}

/// Test server instance. Shuts down when dropped.
pub struct TestServer {
    pub base_url: String,
    pub db: TestDb,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(cron_secret: Option<&str>) -> Self {
        let db = TestDb::new();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            cron_secret: cron_secret.map(str::to_string),
            ..ServerConfig::default()
        };
        let app = make_app(config, GenerationTrigger::new(db.store.clone()));

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            db,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await
                }
            }
        }
    }
}
