use crate::rest::metrics::RestMetricsSnapshot;
use anyhow::Result;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, IntCounter, Opts, Registry};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const TELEMETRY_NAMESPACE: &str = "peggo_exporter";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a fmt tracing subscriber (if one is not already active).
///
/// `RUST_LOG` wins when present, otherwise `default_directive` is used.
/// Calling this function multiple times is harmless.
pub fn init_tracing(default_directive: &str) {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

const LAST_UNKNOWN: u8 = 0;
const LAST_FAILED: u8 = 1;
const LAST_SUCCEEDED: u8 = 2;

/// Process-wide counters describing the exporter's own scrapes.
#[derive(Debug, Default)]
pub struct Telemetry {
    scrapes: AtomicU64,
    scrape_failures: AtomicU64,
    last_outcome: AtomicU8,
    last_duration_bits: AtomicU64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub scrapes: u64,
    pub scrape_failures: u64,
    /// `None` until the first scrape finished.
    pub last_success: Option<bool>,
    pub last_duration: Duration,
}

impl Telemetry {
    pub fn record_scrape(&self, success: bool, elapsed: Duration) {
        self.scrapes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.scrape_failures.fetch_add(1, Ordering::Relaxed);
        }
        let outcome = if success { LAST_SUCCEEDED } else { LAST_FAILED };
        self.last_outcome.store(outcome, Ordering::Relaxed);
        self.last_duration_bits
            .store(elapsed.as_secs_f64().to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let last_success = match self.last_outcome.load(Ordering::Relaxed) {
            LAST_UNKNOWN => None,
            outcome => Some(outcome == LAST_SUCCEEDED),
        };
        TelemetrySnapshot {
            scrapes: self.scrapes.load(Ordering::Relaxed),
            scrape_failures: self.scrape_failures.load(Ordering::Relaxed),
            last_success,
            last_duration: Duration::from_secs_f64(f64::from_bits(
                self.last_duration_bits.load(Ordering::Relaxed),
            )),
        }
    }

    /// Renders scrape counters together with the REST client totals.
    pub fn render(&self, rest: RestMetricsSnapshot) -> Result<Vec<MetricFamily>> {
        let snapshot = self.snapshot();
        let registry = Registry::new();

        register_counter(
            &registry,
            "scrapes_total",
            "Total number of collection cycles run",
            snapshot.scrapes,
        )?;
        register_counter(
            &registry,
            "scrape_failures_total",
            "Total number of collection cycles that produced no metrics",
            snapshot.scrape_failures,
        )?;
        if let Some(success) = snapshot.last_success {
            register_gauge(
                &registry,
                "last_scrape_success",
                "Whether the last collection cycle succeeded",
                if success { 1.0 } else { 0.0 },
            )?;
        }
        register_gauge(
            &registry,
            "last_scrape_duration_seconds",
            "Duration of the last collection cycle in seconds",
            snapshot.last_duration.as_secs_f64(),
        )?;
        register_counter(
            &registry,
            "rest_requests_total",
            "Total number of REST requests issued to the node",
            rest.total_requests,
        )?;
        register_counter(
            &registry,
            "rest_errors_total",
            "Total number of failed REST requests, timeouts included",
            rest.total_errors,
        )?;
        register_counter(
            &registry,
            "rest_timeouts_total",
            "Total number of REST requests that timed out",
            rest.total_timeouts,
        )?;

        Ok(registry.gather())
    }
}

fn register_counter(registry: &Registry, name: &str, help: &str, value: u64) -> Result<()> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(TELEMETRY_NAMESPACE))?;
    counter.inc_by(value);
    registry.register(Box::new(counter))?;
    Ok(())
}

fn register_gauge(registry: &Registry, name: &str, help: &str, value: f64) -> Result<()> {
    let gauge = Gauge::with_opts(Opts::new(name, help).namespace(TELEMETRY_NAMESPACE))?;
    gauge.set(value);
    registry.register(Box::new(gauge))?;
    Ok(())
}
