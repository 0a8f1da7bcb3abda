// Outbound trace-context propagation
// Writes the per-call client span context into request headers so the
// downstream service can join the call to the same distributed trace
//
// Numan Thabit 2025 Nov

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::Context;
use opentelemetry_http::HeaderInjector;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use reqwest::header::HeaderMap;
use std::sync::Arc;

pub type SharedPropagator = Arc<dyn TextMapPropagator + Send + Sync>;

/// W3C `traceparent` / `tracestate` propagation.
pub fn w3c() -> SharedPropagator {
    Arc::new(TraceContextPropagator::new())
}

/// Write `cx` into `headers`. An empty context leaves the headers untouched.
pub fn inject(propagator: &dyn TextMapPropagator, cx: &Context, headers: &mut HeaderMap) {
    propagator.inject_context(cx, &mut HeaderInjector(headers));
}
