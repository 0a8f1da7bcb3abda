// Tag dimensions for outbound HTTP measurements
// Defines the fixed set of tag keys, the status-class bucketing and the
// per-call tag values derived from a request/response pair
//
// Numan Thabit 2025 Nov

use std::fmt;
use std::sync::Arc;

/// Status code recorded when the transport produced no response at all.
/// This is a tagging convention, not a claim that a server answered 500.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// A dimension along which outbound measures are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKey {
    /// HTTP method: GET, POST, etc.
    Method,
    /// Human-friendly name of the API called, supplied by the caller.
    ApiName,
    /// Response status code (404)
    StatusCode,
    /// Response status class (2xx, 3xx, etc.)
    StatusClass,
    /// Application version. For Cloud Run this is the revision name.
    Version,
}

impl TagKey {
    pub const fn name(self) -> &'static str {
        match self {
            TagKey::Method => "http_method",
            TagKey::ApiName => "api_name",
            TagKey::StatusCode => "http_status_code",
            TagKey::StatusClass => "http_status_class",
            TagKey::Version => "version_name",
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, immutable set of tag keys shared by reference between views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKeys(Arc<[TagKey]>);

impl TagKeys {
    pub fn new(keys: impl Into<Arc<[TagKey]>>) -> Self {
        Self(keys.into())
    }

    /// The canonical ordering used by both outbound views.
    pub fn outbound() -> Self {
        Self::new([
            TagKey::Method,
            TagKey::ApiName,
            TagKey::StatusCode,
            TagKey::StatusClass,
            TagKey::Version,
        ])
    }

    pub fn keys(&self) -> &[TagKey] {
        &self.0
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|key| key.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Hundreds-digit bucket of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Unknown,
}

impl StatusClass {
    pub fn from_code(code: u16) -> Self {
        match code {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StatusClass::Informational => "1xx",
            StatusClass::Success => "2xx",
            StatusClass::Redirection => "3xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
            StatusClass::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag values for a single outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTags {
    method: String,
    api_name: String,
    status_code: u16,
    status_text: String,
    status_class: StatusClass,
    version_name: String,
}

impl OutboundTags {
    /// Derive tags from the request method and the response status, if any.
    /// A missing status falls back to [`TRANSPORT_FAILURE_STATUS`].
    pub fn derive(
        method: impl Into<String>,
        api_name: impl Into<String>,
        version_name: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        let status_code = status.unwrap_or(TRANSPORT_FAILURE_STATUS);
        Self {
            method: method.into(),
            api_name: api_name.into(),
            status_code,
            status_text: status_code.to_string(),
            status_class: StatusClass::from_code(status_code),
            version_name: version_name.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_class(&self) -> StatusClass {
        self.status_class
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    pub fn value(&self, key: TagKey) -> &str {
        match key {
            TagKey::Method => &self.method,
            TagKey::ApiName => &self.api_name,
            TagKey::StatusCode => &self.status_text,
            TagKey::StatusClass => self.status_class.as_str(),
            TagKey::Version => &self.version_name,
        }
    }

    /// Tag values laid out in the order of `keys`.
    pub fn values<'a>(&'a self, keys: &TagKeys) -> Vec<&'a str> {
        keys.keys().iter().map(|key| self.value(*key)).collect()
    }
}
