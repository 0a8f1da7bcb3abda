use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use opentelemetry::global;
use opentelemetry_sdk::trace::SdkTracerProvider;
use outbound_telemetry::config::{AppConfig, ProbeTarget};
use outbound_telemetry::server::serve_metrics;
use outbound_telemetry::{InstrumentedClient, MetricRegistry};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal probe error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;

    // Views must exist before the first call is recorded; refuse to start otherwise.
    let metrics = MetricRegistry::initialize(prometheus::default_registry().clone())
        .context("register outbound metric views")?;
    // Every probe runs in its own client span; exporters, if any, hang off this provider.
    let tracer_provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(tracer_provider.clone());
    let client =
        InstrumentedClient::new(metrics.clone()).with_tracer_provider(tracer_provider.clone());

    let listener = tokio::net::TcpListener::bind(config.metrics_addr)
        .await
        .with_context(|| format!("bind metrics address {}", config.metrics_addr))?;
    info!(address = %config.metrics_addr, "metrics server starting");
    let metrics_server = tokio::spawn(serve_metrics(listener, metrics));

    if config.targets.is_empty() {
        warn!("no probe targets configured; only serving /metrics");
    }

    let app = App {
        config: Arc::new(config),
        client,
        shutdown: CancellationToken::new(),
    };
    let result = app.run(metrics_server).await;
    if let Err(err) = tracer_provider.shutdown() {
        warn!(error = %err, "tracer provider shutdown");
    }
    result
}

struct App {
    config: Arc<AppConfig>,
    client: InstrumentedClient,
    shutdown: CancellationToken,
}

impl App {
    /// Probe until shutdown. Losing the metrics server is fatal: without it
    /// nothing can scrape what the probes record.
    async fn run(self, mut metrics_server: JoinHandle<std::io::Result<()>>) -> Result<()> {
        info!(
            version = %self.config.version_name,
            targets = self.config.targets.len(),
            interval_secs = self.config.probe_interval_secs,
            timeout_ms = self.config.timeout_ms,
            "outbound probe online"
        );

        // Cancelling the token also aborts probes that are still in flight.
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "ctrl_c listener error");
            }
            info!("Shutdown signal received, exiting");
            shutdown.cancel();
        });

        let mut ticker = tokio::time::interval(self.config.probe_interval());
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                res = &mut metrics_server => {
                    self.shutdown.cancel();
                    return match res {
                        Ok(Ok(())) => Err(anyhow!("metrics server stopped")),
                        Ok(Err(err)) => Err(anyhow::Error::new(err).context("metrics server failed")),
                        Err(err) => Err(anyhow::Error::new(err).context("metrics server task panicked")),
                    };
                }
                _ = ticker.tick() => {
                    let round = self.config.targets.iter().map(|target| self.probe(target));
                    join_all(round).await;
                }
            }
        }
        metrics_server.abort();
        Ok(())
    }

    async fn probe(&self, target: &ProbeTarget) {
        let method = match target.http_method() {
            Ok(method) => method,
            Err(err) => {
                warn!(api = %target.api_name, error = %err, "could not build probe request");
                return;
            }
        };
        let request = reqwest::Request::new(method, target.url.clone());

        let outcome = self
            .client
            .execute_with_cancel(
                request,
                &target.api_name,
                &self.config.version_name,
                self.config.timeout(),
                &self.shutdown,
            )
            .await;
        let latency_ms = outcome.latency.as_millis() as u64;
        let (response, recording) = outcome.into_parts();

        match response {
            Ok(resp) => info!(
                api = %target.api_name,
                status = resp.status().as_u16(),
                latency_ms,
                "probe completed"
            ),
            Err(err) => warn!(
                api = %target.api_name,
                error = %err,
                timeout = err.is_timeout(),
                latency_ms,
                "probe failed"
            ),
        }
        // Log and continue; a missed data point never fails the probe.
        if let Err(err) = recording {
            warn!(api = %target.api_name, error = %err, "probe metrics not recorded");
        }
    }
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
