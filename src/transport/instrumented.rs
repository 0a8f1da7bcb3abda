// Instrumented outbound HTTP client
// Executes a single request, measures its wall-clock latency and records
// one latency observation plus one count per call, whatever the outcome
//
// Numan Thabit 2025 Nov

use crate::errors::{CallError, RecordError};
use crate::metrics::MetricRegistry;
use crate::tags::OutboundTags;
use crate::transport::propagation::{self, SharedPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::SdkTracerProvider;
use reqwest::{Client, Request, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of one instrumented call.
///
/// `response` and `recording` are independent: a call can fail while its
/// measurement is recorded, and a successful call can fail to record.
#[derive(Debug)]
pub struct CallOutcome {
    pub response: Result<Response, CallError>,
    pub recording: Result<(), RecordError>,
    pub latency: Duration,
    pub tags: OutboundTags,
}

impl CallOutcome {
    pub fn into_parts(self) -> (Result<Response, CallError>, Result<(), RecordError>) {
        (self.response, self.recording)
    }
}

#[derive(Clone)]
pub struct InstrumentedClient {
    http: Client,
    metrics: Arc<MetricRegistry>,
    propagator: SharedPropagator,
    tracer_provider: SdkTracerProvider,
}

const TRACER_NAME: &str = "outbound-telemetry";

impl InstrumentedClient {
    pub fn new(metrics: Arc<MetricRegistry>) -> Self {
        Self::with_client(Client::new(), metrics)
    }

    /// Wrap an existing reqwest client. Pooling, TLS and proxy settings are
    /// taken from `http` as-is.
    pub fn with_client(http: Client, metrics: Arc<MetricRegistry>) -> Self {
        Self {
            http,
            metrics,
            propagator: propagation::w3c(),
            tracer_provider: SdkTracerProvider::builder().build(),
        }
    }

    /// Start client spans from `provider` (e.g. one with an exporter installed)
    /// instead of the built-in provider, which only generates span ids.
    pub fn with_tracer_provider(mut self, provider: SdkTracerProvider) -> Self {
        self.tracer_provider = provider;
        self
    }

    /// Execute `request` and record its latency and count.
    ///
    /// `timeout` bounds the whole call; `Duration::ZERO` leaves the request
    /// without a timeout. If you don't need one, prefer a very long duration.
    /// No retries are attempted.
    pub async fn execute(
        &self,
        request: Request,
        api_name: &str,
        version_name: &str,
        timeout: Duration,
    ) -> CallOutcome {
        self.execute_with_cancel(
            request,
            api_name,
            version_name,
            timeout,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`execute`](Self::execute), aborting the call when `cancel` fires.
    /// A cancelled call is still recorded, tagged as a transport failure.
    pub async fn execute_with_cancel(
        &self,
        mut request: Request,
        api_name: &str,
        version_name: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CallOutcome {
        let start = Instant::now();

        if !timeout.is_zero() {
            *request.timeout_mut() = Some(timeout);
        }
        let method = request.method().clone();

        // Client span per call: a child of the caller's trace, or a new root.
        let tracer = self.tracer_provider.tracer(TRACER_NAME);
        let parent = Context::current();
        let span = tracer
            .span_builder(format!("HTTP {method}"))
            .with_kind(SpanKind::Client)
            .with_attributes(vec![
                KeyValue::new("http.request.method", method.to_string()),
                KeyValue::new("url.full", request.url().to_string()),
                KeyValue::new("api_name", api_name.to_string()),
            ])
            .start_with_context(&tracer, &parent);
        let cx = parent.with_span(span);
        propagation::inject(self.propagator.as_ref(), &cx, request.headers_mut());

        debug!(%method, url = %request.url(), api = api_name, "sending outbound request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CallError::Cancelled),
            res = self.http.execute(request) => res.map_err(CallError::from),
        };
        let latency = start.elapsed();

        let status = response.as_ref().ok().map(|resp| resp.status().as_u16());
        let tags = OutboundTags::derive(method.as_str(), api_name, version_name, status);
        let recording = self.metrics.record(&tags, latency);

        let span = cx.span();
        span.set_attribute(KeyValue::new(
            "http.response.status_code",
            i64::from(tags.status_code()),
        ));
        match &response {
            Ok(resp) if resp.status().is_server_error() => {
                span.set_status(Status::error("server error"))
            }
            Ok(_) => span.set_status(Status::Ok),
            Err(err) => span.set_status(Status::error(err.to_string())),
        }
        span.end();

        match &response {
            Ok(resp) => debug!(
                %method,
                api = api_name,
                status = resp.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "outbound request completed"
            ),
            Err(err) => debug!(
                %method,
                api = api_name,
                error = %err,
                latency_ms = latency.as_millis() as u64,
                "outbound request failed"
            ),
        }
        if let Err(err) = &recording {
            debug!(api = api_name, error = %err, "outbound metrics not recorded");
        }

        CallOutcome {
            response,
            recording,
            latency,
            tags,
        }
    }
}
