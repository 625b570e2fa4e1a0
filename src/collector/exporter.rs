//! One collection cycle: resolve, sample, aggregate, render.

use crate::collector::aggregate::{AggregationResult, SyncAggregator};
use crate::collector::resolver::ValidatorResolver;
use crate::collector::sampler::NonceSampler;
use crate::rest::client::{ErrorClass, GravityQuery};
use crate::runtime::config::ExporterConfig;
use anyhow::Result;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts, Registry};
use std::sync::Arc;

pub const NAMESPACE: &str = "peggo";

const HIGHEST_NONCE_HELP: &str = "The highest event nonce of the Umee network";
const OWN_NONCE_HELP: &str = "The own event nonce of the Umee network";
const SYNC_HELP: &str =
    "Compare your own orchestrator event nonce with the highest event nonce are the same";

#[derive(Clone)]
pub struct Exporter {
    resolver: ValidatorResolver,
    sampler: NonceSampler,
    aggregator: SyncAggregator,
}

impl Exporter {
    pub fn new(
        query: Arc<dyn GravityQuery>,
        own_address: impl Into<String>,
        concurrency: usize,
        allow_partial: bool,
    ) -> Self {
        Self {
            resolver: ValidatorResolver::new(Arc::clone(&query), concurrency),
            sampler: NonceSampler::new(query, concurrency),
            aggregator: SyncAggregator::new(own_address, allow_partial),
        }
    }

    pub fn from_config(config: &ExporterConfig, query: Arc<dyn GravityQuery>) -> Self {
        Self::new(
            query,
            config.orchestrator_address(),
            config.concurrency(),
            config.allow_partial_samples(),
        )
    }

    pub fn own_address(&self) -> &str {
        self.aggregator.own_address()
    }

    /// Runs one full cycle and returns the aggregated view of the network.
    pub async fn collect(&self) -> Result<AggregationResult> {
        let resolutions = self.resolver.resolve().await?;
        let set = self.sampler.sample(resolutions).await;
        let result = self.aggregator.reduce(set)?;

        tracing::info!(
            own_orchestrator = self.own_address(),
            own_event_nonce = result.own_nonce,
            highest_event_nonce = result.highest_nonce,
            event_nonces = ?result.nonces,
            peers_ahead_fraction = ?result.peers_ahead_fraction,
            failed_samples = result.failed_samples,
            timestamp = result.timestamp,
            "collected event nonces"
        );
        if result.own_lookup_failed {
            tracing::warn!(
                own_orchestrator = self.own_address(),
                "own orchestrator nonce lookup failed"
            );
        } else if !result.own_found {
            tracing::warn!(
                own_orchestrator = self.own_address(),
                orchestrators = result.nonces.len(),
                "own orchestrator not found among bonded validators"
            );
        }

        Ok(result)
    }

    /// Collects and renders the core families. An aborted cycle yields none.
    pub async fn scrape(&self) -> Result<Vec<MetricFamily>> {
        let result = self.collect().await.map_err(|err| {
            tracing::error!(
                error_class = ?ErrorClass::of(&err),
                error = %format!("{err:#}"),
                "collection cycle aborted"
            );
            err
        })?;
        render(&result)
    }
}

/// Renders an aggregation result into freshly registered gauge families.
pub fn render(result: &AggregationResult) -> Result<Vec<MetricFamily>> {
    let registry = Registry::new();

    register_gauge(
        &registry,
        "peggo_heighest_event_nonce",
        HIGHEST_NONCE_HELP,
        result.highest_nonce as f64,
    )?;
    register_gauge(
        &registry,
        "peggo_own_event_nonce",
        OWN_NONCE_HELP,
        result.own_nonce as f64,
    )?;
    register_gauge(&registry, "peggo_sync", SYNC_HELP, result.verdict.as_gauge())?;
    register_gauge(
        &registry,
        "peggo_own_orchestrator_found",
        "Whether the configured orchestrator was among the sampled orchestrators",
        if result.own_found { 1.0 } else { 0.0 },
    )?;
    register_gauge(
        &registry,
        "peggo_peers_ahead",
        "Number of orchestrators with an event nonce above the own one",
        result.peers_ahead_count as f64,
    )?;
    if let Some(fraction) = result.peers_ahead_fraction {
        register_gauge(
            &registry,
            "peggo_peers_ahead_ratio",
            "Fraction of sampled orchestrators with an event nonce above the own one",
            fraction,
        )?;
    }
    register_gauge(
        &registry,
        "peggo_orchestrators",
        "Number of orchestrators whose event nonce was sampled",
        result.nonces.len() as f64,
    )?;
    register_gauge(
        &registry,
        "peggo_failed_samples",
        "Number of orchestrator lookups that failed in the last cycle",
        result.failed_samples as f64,
    )?;

    Ok(registry.gather())
}

fn register_gauge(registry: &Registry, name: &str, help: &str, value: f64) -> Result<()> {
    let gauge = Gauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    gauge.set(value);
    registry.register(Box::new(gauge))?;
    Ok(())
}
