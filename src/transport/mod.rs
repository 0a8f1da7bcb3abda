// Transport module - instrumented outbound HTTP
// This file exposes the client that wraps each outbound call with
// trace-context propagation and latency/count recording
//
// Numan Thabit 2025 Nov

pub mod instrumented;
pub mod propagation;

pub use instrumented::{CallOutcome, InstrumentedClient};
