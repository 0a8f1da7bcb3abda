// Error types for the outbound telemetry pipeline
// Registration, recording and transport failures are kept as separate
// types so a caller can never confuse one fault domain with another
//
// Numan Thabit 2025 Nov

use thiserror::Error;

/// Failure to define a view at startup. Fatal to initialization.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("view {name} is already registered with a different definition")]
    Conflict { name: String },
    #[error("malformed view {name}: {reason}")]
    Malformed { name: String, reason: String },
    #[error("metrics backend error: {0}")]
    Backend(#[from] prometheus::Error),
}

/// Failure to submit a measurement after a call completed.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("view {0} is not registered; initialize the metric registry first")]
    ViewNotRegistered(&'static str),
    #[error("metrics backend rejected measurement: {0}")]
    Backend(#[from] prometheus::Error),
}

/// Failure of the outbound HTTP call itself.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("call cancelled before a response was received")]
    Cancelled,
}

impl CallError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Transport(err) if err.is_timeout())
    }
}
