// Configuration management module
// This file handles loading and parsing of the probe settings
// from an optional config file and environment variables
//
// Numan Thabit 2025 Nov

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use reqwest::Method;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Application version attached to every measurement. Defaults to the
    /// Cloud Run revision (K_REVISION) when present, else the crate version.
    #[serde(default = "default_version_name")]
    pub version_name: String,
    /// Address of the /metrics endpoint
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    /// Seconds between probe rounds
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Per-call timeout in milliseconds; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Upstream APIs to call each round
    #[serde(default)]
    pub targets: Vec<ProbeTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeTarget {
    /// Human-friendly name used as the api_name tag, e.g. /v1/books/search
    pub api_name: String,
    pub url: Url,
    #[serde(default = "default_method")]
    pub method: String,
}

impl ProbeTarget {
    pub fn http_method(&self) -> Result<Method> {
        Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method for {}: {}", self.api_name, self.method))
    }
}

impl AppConfig {
    /// Load from `outbound.{yaml,toml,json}` (or the path in OUTBOUND_CONFIG)
    /// overlaid with OUTBOUND_* environment variables.
    pub fn load() -> Result<Self> {
        let file = std::env::var("OUTBOUND_CONFIG").unwrap_or_else(|_| "outbound".to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("OUTBOUND")
                    .prefix_separator("_")
                    .separator("__"),
            );
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.probe_interval_secs == 0 {
            bail!("probe_interval_secs must be greater than zero");
        }
        for target in &self.targets {
            target.http_method()?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

fn default_version_name() -> String {
    std::env::var("K_REVISION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string())
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_method() -> String {
    "GET".to_string()
}
