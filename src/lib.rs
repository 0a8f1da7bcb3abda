// Library root module for outbound-telemetry
// This file defines the public API and module structure: an outbound HTTP
// client that tags every call and records its latency and count
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod errors;
pub mod metrics;
pub mod server;
pub mod tags;
pub mod transport;

pub use errors::{CallError, RecordError, RegistryError};
pub use metrics::MetricRegistry;
pub use tags::{OutboundTags, StatusClass, TagKey, TagKeys};
pub use transport::{CallOutcome, InstrumentedClient};
