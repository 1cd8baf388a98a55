use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all notifier metrics
const PREFIX: &str = "deadline_notifier";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Generation Metrics
    pub static ref GENERATION_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_generation_runs_total"), "Notification generation runs"),
        &["status"]
    ).expect("Failed to create generation_runs_total metric");

    // Delivery Metrics
    pub static ref NOTIFICATIONS_DISPLAYED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_notifications_displayed_total"),
            "Notifications handed to the platform for display"
        ),
        &["channel"]
    ).expect("Failed to create notifications_displayed_total metric");

    pub static ref PUSH_PAYLOADS_DROPPED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_push_payloads_dropped_total"),
        "Push payloads dropped because they could not be parsed"
    ).expect("Failed to create push_payloads_dropped_total metric");

    // Store Metrics
    pub static ref STORE_REMOTE_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_store_remote_failures_total"),
            "Failed remote store operations"
        ),
        &["operation"]
    ).expect("Failed to create store_remote_failures_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(GENERATION_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_DISPLAYED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PUSH_PAYLOADS_DROPPED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STORE_REMOTE_FAILURES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a generation trigger outcome ("success" or "failure")
pub fn record_generation_run(status: &str) {
    GENERATION_RUNS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a displayed notification ("local" or "push")
pub fn record_notification_displayed(channel: &str) {
    NOTIFICATIONS_DISPLAYED_TOTAL
        .with_label_values(&[channel])
        .inc();
}

pub fn record_push_payload_dropped() {
    PUSH_PAYLOADS_DROPPED_TOTAL.inc();
}

/// Record a failed remote read or write issued by a notification store
pub fn record_store_remote_failure(operation: &str) {
    STORE_REMOTE_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
