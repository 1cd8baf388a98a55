use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{log_requests, metrics, state::ServerState, ServerConfig};
use crate::generation::GenerationTrigger;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
    };
    Json(stats)
}

fn is_authorized(config: &ServerConfig, headers: &HeaderMap) -> bool {
    let Some(secret) = &config.cron_secret else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes()))
}

/// Constant-time comparison of byte slices. Only the length leaks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Serialize)]
struct PushConfigResponse {
    handler_path: String,
    scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    relay_public_key: Option<String>,
}

/// Settings a client needs to register its background handler and subscribe.
async fn push_config(State(config): State<ServerConfig>) -> impl IntoResponse {
    Json(PushConfigResponse {
        handler_path: config.push.handler_path,
        scope: config.push.scope,
        relay_public_key: config.relay_public_key,
    })
}

/// Shared by the manual and the cron route.
async fn generate_notifications(
    State(config): State<ServerConfig>,
    State(trigger): State<GenerationTrigger>,
    headers: HeaderMap,
) -> Response {
    if !is_authorized(&config, &headers) {
        warn!("Rejected unauthorized generation trigger");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match trigger.generate().await {
        Ok(outcome) => Json(GenerateResponse {
            success: true,
            generated: outcome.generated,
            error: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(GenerateResponse {
                success: false,
                generated: None,
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

pub fn make_app(config: ServerConfig, trigger: GenerationTrigger) -> Router {
    let state = ServerState::new(config, trigger);

    let notification_routes: Router = Router::new()
        .route("/generate", post(generate_notifications))
        .with_state(state.clone());

    let cron_routes: Router = Router::new()
        .route("/generate-notifications", get(generate_notifications))
        .with_state(state.clone());

    let push_routes: Router = Router::new()
        .route("/config", get(push_config))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router
        .nest("/v1/notifications", notification_routes)
        .nest("/v1/cron", cron_routes)
        .nest("/v1/push", push_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

async fn serve(app: Router, port: u16, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Serve the trigger endpoint until `shutdown` fires.
pub async fn run_server(
    config: ServerConfig,
    trigger: GenerationTrigger,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, trigger);
    info!("Ready to serve at port {}!", port);
    serve(app, port, shutdown).await
}

pub async fn run_metrics_server(port: u16, shutdown: CancellationToken) -> Result<()> {
    info!("Metrics available at port {}!", port);
    serve(make_metrics_app(), port, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationOutcome, NotificationGenerator};
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    struct FakeGenerator {
        calls: AtomicUsize,
        error: Option<&'static str>,
    }

    #[async_trait]
    impl NotificationGenerator for FakeGenerator {
        async fn generate(&self) -> anyhow::Result<GenerationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.error {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(GenerationOutcome { generated: Some(4) }),
            }
        }
    }

    fn app_with(
        cron_secret: Option<&str>,
        error: Option<&'static str>,
    ) -> (Router, Arc<FakeGenerator>) {
        let generator = Arc::new(FakeGenerator {
            calls: AtomicUsize::new(0),
            error,
        });
        let config = ServerConfig {
            requests_logging_level: super::super::RequestsLoggingLevel::None,
            cron_secret: cron_secret.map(str::to_string),
            ..ServerConfig::default()
        };
        let app = make_app(config, GenerationTrigger::new(generator.clone()));
        (app, generator)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn manual() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/notifications/generate")
            .body(Body::empty())
            .unwrap()
    }

    fn cron() -> Request<Body> {
        Request::builder()
            .uri("/v1/cron/generate-notifications")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[tokio::test]
    async fn both_trigger_routes_are_equivalent() {
        for request in [manual(), cron()] {
            let (app, generator) = app_with(None, None);

            let response = app.oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["generated"], 4);
            assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn upstream_error_is_returned_verbatim() {
        let (app, _) = app_with(None, Some("permission denied for function generate"));

        let response = app.oneshot(cron()).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "permission denied for function generate");
    }

    #[tokio::test]
    async fn cron_secret_is_enforced() {
        let (app, generator) = app_with(Some("s3cret"), None);

        let response = app.clone().oneshot(cron()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/v1/cron/generate-notifications")
            .header("Authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

        let right = Request::builder()
            .method("POST")
            .uri("/v1/notifications/generate")
            .header("Authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(right).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3crex"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(!constant_time_eq(b"", b"s3cret"));
        assert!(constant_time_eq(b"", b""));
    }

    #[tokio::test]
    async fn cron_secret_rejects_prefix_and_extension() {
        let (app, generator) = app_with(Some("s3cret"), None);

        for token in ["Bearer s3cre", "Bearer s3cret2", "Bearer S3CRET", "s3cret"] {
            let request = Request::builder()
                .uri("/v1/cron/generate-notifications")
                .header("Authorization", token)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", token);
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn push_config_is_served() {
        let generator = Arc::new(FakeGenerator {
            calls: AtomicUsize::new(0),
            error: None,
        });
        let config = ServerConfig {
            requests_logging_level: super::super::RequestsLoggingLevel::None,
            push: crate::push::PushConfig {
                handler_path: "/push-handler.js".to_string(),
                scope: "/app/".to_string(),
            },
            relay_public_key: Some("BNcRdreALRFX".to_string()),
            ..ServerConfig::default()
        };
        let app = make_app(config, GenerationTrigger::new(generator));

        let request = Request::builder()
            .uri("/v1/push/config")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["handler_path"], "/push-handler.js");
        assert_eq!(body["scope"], "/app/");
        assert_eq!(body["relay_public_key"], "BNcRdreALRFX");
    }

    #[tokio::test]
    async fn push_config_omits_missing_relay_key() {
        let (app, _) = app_with(None, None);

        let request = Request::builder()
            .uri("/v1/push/config")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["handler_path"], "/sw.js");
        assert!(body.get("relay_public_key").is_none());
    }

    #[tokio::test]
    async fn home_reports_uptime() {
        let (app, _) = app_with(None, None);

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["uptime"].as_str().unwrap().starts_with("0d"));
    }

    #[tokio::test]
    async fn metrics_route_is_served() {
        metrics::init_metrics();
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = make_metrics_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
