// Metrics and observability module
// Defines the outbound latency/count measures, their views, and the
// registry handle every instrumented client records into
//
// Numan Thabit 2025 Nov

use crate::errors::{RecordError, RegistryError};
use crate::tags::{OutboundTags, TagKeys};
use once_cell::sync::OnceCell;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Histogram bucket upper bounds in milliseconds. Anything above the last
/// bound lands in the implicit `+Inf` bucket.
pub const LATENCY_BUCKETS_MS: &[f64] = &[0.0, 100.0, 200.0, 400.0, 1000.0, 2000.0, 4000.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Milliseconds,
    Dimensionless,
}

impl Unit {
    /// Unit symbol carried in the exported help text; dimensionless has none.
    pub const fn symbol(self) -> Option<&'static str> {
        match self {
            Unit::Milliseconds => Some("ms"),
            Unit::Dimensionless => None,
        }
    }
}

/// A named numeric signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: Unit,
}

pub const OUTBOUND_LATENCY: Measure = Measure {
    name: "http_outbound_latency",
    description: "Latency of the external HTTP API",
    unit: Unit::Milliseconds,
};

pub const OUTBOUND_COUNT: Measure = Measure {
    name: "http_outbound_count",
    description: "Request count to the external HTTP API",
    unit: Unit::Dimensionless,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Histogram with the given bucket upper bounds.
    Distribution(Vec<f64>),
    Count,
}

/// Binding of a measure to its tag keys and aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub name: String,
    pub description: String,
    pub unit: Unit,
    pub tag_keys: TagKeys,
    pub aggregation: Aggregation,
}

impl ViewDefinition {
    fn for_measure(measure: &Measure, tag_keys: &TagKeys, aggregation: Aggregation) -> Self {
        Self {
            name: measure.name.to_string(),
            description: measure.description.to_string(),
            unit: measure.unit,
            tag_keys: tag_keys.clone(),
            aggregation,
        }
    }

    /// Help text of the exported family, e.g. `Latency of the external HTTP API [ms]`.
    pub fn help(&self) -> String {
        match self.unit.symbol() {
            Some(symbol) => format!("{} [{symbol}]", self.description),
            None => self.description.clone(),
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let malformed = |reason: &str| RegistryError::Malformed {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.tag_keys.is_empty() {
            return Err(malformed("no tag keys"));
        }
        let mut seen = HashSet::new();
        if !self.tag_keys.keys().iter().all(|key| seen.insert(*key)) {
            return Err(malformed("duplicate tag keys"));
        }
        if let Aggregation::Distribution(buckets) = &self.aggregation {
            if buckets.is_empty() {
                return Err(malformed("distribution without buckets"));
            }
            if buckets.iter().any(|b| !b.is_finite()) {
                return Err(malformed("bucket bounds must be finite"));
            }
            if buckets.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(malformed("bucket bounds must be strictly increasing"));
            }
        }
        Ok(())
    }
}

struct RegisteredView<C> {
    definition: ViewDefinition,
    collector: C,
}

/// Process-wide handle to the outbound views.
///
/// Created once at startup (see [`MetricRegistry::initialize`]) and shared with
/// every [`crate::transport::InstrumentedClient`]. Recording against a handle
/// whose views were never registered fails with [`RecordError::ViewNotRegistered`]
/// instead of silently dropping data.
pub struct MetricRegistry {
    registry: Registry,
    latency: OnceCell<RegisteredView<HistogramVec>>,
    count: OnceCell<RegisteredView<IntCounterVec>>,
}

impl MetricRegistry {
    /// An empty handle over `registry`; no views are registered yet.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            latency: OnceCell::new(),
            count: OnceCell::new(),
        }
    }

    /// Register both outbound views with the canonical tag keys.
    pub fn initialize(registry: Registry) -> Result<Arc<Self>, RegistryError> {
        let metrics = Self::new(registry);
        let tag_keys = TagKeys::outbound();
        metrics.register_latency_view(&OUTBOUND_LATENCY, &tag_keys)?;
        metrics.register_counter_view(&OUTBOUND_COUNT, &tag_keys)?;
        Ok(Arc::new(metrics))
    }

    pub fn register_latency_view(
        &self,
        measure: &Measure,
        tag_keys: &TagKeys,
    ) -> Result<(), RegistryError> {
        let buckets = LATENCY_BUCKETS_MS.to_vec();
        let definition = ViewDefinition::for_measure(
            measure,
            tag_keys,
            Aggregation::Distribution(buckets.clone()),
        );
        register_once(&self.latency, definition, |def| {
            let opts = HistogramOpts::new(def.name.clone(), def.help()).buckets(buckets);
            let histogram = HistogramVec::new(opts, &def.tag_keys.names())
                .map_err(|err| backend_error(&def.name, err))?;
            self.registry
                .register(Box::new(histogram.clone()))
                .map_err(|err| backend_error(&def.name, err))?;
            Ok(histogram)
        })
    }

    pub fn register_counter_view(
        &self,
        measure: &Measure,
        tag_keys: &TagKeys,
    ) -> Result<(), RegistryError> {
        let definition = ViewDefinition::for_measure(measure, tag_keys, Aggregation::Count);
        register_once(&self.count, definition, |def| {
            let opts = Opts::new(def.name.clone(), def.help());
            let counter = IntCounterVec::new(opts, &def.tag_keys.names())
                .map_err(|err| backend_error(&def.name, err))?;
            self.registry
                .register(Box::new(counter.clone()))
                .map_err(|err| backend_error(&def.name, err))?;
            Ok(counter)
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.latency.get().is_some() && self.count.get().is_some()
    }

    /// Definitions of the views registered so far.
    pub fn views(&self) -> Vec<&ViewDefinition> {
        let latency = self.latency.get().map(|view| &view.definition);
        let count = self.count.get().map(|view| &view.definition);
        latency.into_iter().chain(count).collect()
    }

    /// Submit one latency observation and one count of 1 for a finished call.
    ///
    /// Both views are resolved before anything is written, so the call is
    /// either fully recorded or not at all.
    pub fn record(&self, tags: &OutboundTags, latency: Duration) -> Result<(), RecordError> {
        let latency_view = self
            .latency
            .get()
            .ok_or(RecordError::ViewNotRegistered(OUTBOUND_LATENCY.name))?;
        let count_view = self
            .count
            .get()
            .ok_or(RecordError::ViewNotRegistered(OUTBOUND_COUNT.name))?;

        let histogram = latency_view
            .collector
            .get_metric_with_label_values(&tags.values(&latency_view.definition.tag_keys))?;
        let counter = count_view
            .collector
            .get_metric_with_label_values(&tags.values(&count_view.definition.tag_keys))?;

        // whole milliseconds, truncated
        let millis = latency.as_millis() as f64;
        histogram.observe(millis);
        counter.inc();
        Ok(())
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every family in the backing registry in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

fn register_once<C>(
    slot: &OnceCell<RegisteredView<C>>,
    definition: ViewDefinition,
    build: impl FnOnce(&ViewDefinition) -> Result<C, RegistryError>,
) -> Result<(), RegistryError> {
    definition.validate()?;

    let mut created = false;
    let view = slot.get_or_try_init(|| {
        let collector = build(&definition)?;
        created = true;
        Ok::<_, RegistryError>(RegisteredView {
            definition: definition.clone(),
            collector,
        })
    })?;

    if created {
        debug!(view = %definition.name, keys = ?definition.tag_keys.names(), "registered view");
        return Ok(());
    }
    if view.definition != definition {
        return Err(RegistryError::Conflict {
            name: definition.name,
        });
    }
    Ok(())
}

fn backend_error(name: &str, err: prometheus::Error) -> RegistryError {
    match err {
        prometheus::Error::AlreadyReg => RegistryError::Conflict {
            name: name.to_string(),
        },
        prometheus::Error::Msg(reason) => RegistryError::Malformed {
            name: name.to_string(),
            reason,
        },
        other => RegistryError::Backend(other),
    }
}
