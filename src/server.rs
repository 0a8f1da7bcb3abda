// Metrics HTTP endpoint
// Serves the registry's collected families for Prometheus scraping
//
// Numan Thabit 2025 Nov

use crate::metrics::MetricRegistry;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::error;

pub fn create_metrics_router(metrics: Arc<MetricRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the metrics router on `listener` until the server fails.
pub async fn serve_metrics(
    listener: TcpListener,
    metrics: Arc<MetricRegistry>,
) -> std::io::Result<()> {
    axum::serve(listener, create_metrics_router(metrics)).await
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics_handler(State(metrics): State<Arc<MetricRegistry>>) -> Response {
    match metrics.encode_text() {
        Ok(body) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {err}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::OutboundTags;
    use prometheus::Registry;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_recorded_measurements() {
        let metrics = MetricRegistry::initialize(Registry::new()).unwrap();
        let tags = OutboundTags::derive("GET", "search", "v3", Some(200));
        metrics.record(&tags, Duration::from_millis(42)).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_metrics(listener, metrics));

        let resp = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body = resp.text().await.unwrap();
        assert!(body.contains("http_outbound_latency_bucket{"));
        assert!(body.contains("api_name=\"search\""));

        let health = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);

        // a healthy server never resolves its handle
        assert!(!server.is_finished());
        server.abort();
    }
}
