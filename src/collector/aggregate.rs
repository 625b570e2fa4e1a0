//! Reduction of event-nonce samples into a sync verdict for one orchestrator.

use crate::rest::client::ErrorClass;
use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

/// Latest event nonce reported for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNonceSample {
    pub orchestrator: String,
    pub nonce: u64,
}

impl EventNonceSample {
    pub fn new(orchestrator: impl Into<String>, nonce: u64) -> Self {
        Self {
            orchestrator: orchestrator.into(),
            nonce,
        }
    }
}

/// Pipeline stage at which a per-validator lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStage {
    DelegateKeys,
    EventNonce,
}

#[derive(Debug, Clone)]
pub struct SampleFailure {
    /// Validator address for `DelegateKeys`, orchestrator address for `EventNonce`.
    pub subject: String,
    pub stage: SampleStage,
    /// `None` when the failure did not come from the REST client.
    pub class: Option<ErrorClass>,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    pub samples: Vec<EventNonceSample>,
    pub failures: Vec<SampleFailure>,
}

impl SampleSet {
    pub fn attempted(&self) -> usize {
        self.samples.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncVerdict {
    InSync,
    Behind,
}

impl SyncVerdict {
    pub fn as_gauge(self) -> f64 {
        match self {
            SyncVerdict::InSync => 1.0,
            SyncVerdict::Behind => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    /// Nonce of the configured orchestrator, 0 when it was not sampled.
    pub own_nonce: u64,
    /// Whether the configured orchestrator appeared among the samples.
    pub own_found: bool,
    /// The configured orchestrator resolved, but its nonce lookup failed.
    pub own_lookup_failed: bool,
    pub highest_nonce: u64,
    /// Sampled nonces in validator order.
    pub nonces: Vec<u64>,
    pub peers_ahead_count: usize,
    /// `None` when there were no samples to compare against.
    pub peers_ahead_fraction: Option<f64>,
    pub verdict: SyncVerdict,
    pub failed_samples: usize,
    /// Unix seconds at which the reduction ran.
    pub timestamp: u64,
}

#[derive(Debug)]
pub enum CollectError {
    Incomplete { failed: usize, total: usize },
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Incomplete { failed, total } => write!(
                f,
                "{failed} of {total} orchestrator lookups failed; partial samples are not reported"
            ),
        }
    }
}

impl std::error::Error for CollectError {}

#[derive(Debug, Clone)]
pub struct SyncAggregator {
    own_address: String,
    allow_partial: bool,
}

impl SyncAggregator {
    pub fn new(own_address: impl Into<String>, allow_partial: bool) -> Self {
        Self {
            own_address: own_address.into().trim().to_owned(),
            allow_partial,
        }
    }

    pub fn own_address(&self) -> &str {
        &self.own_address
    }

    /// Applies the partial-sample policy, then aggregates what was sampled.
    pub fn reduce(&self, set: SampleSet) -> Result<AggregationResult> {
        if !set.is_complete() && !self.allow_partial {
            return Err(CollectError::Incomplete {
                failed: set.failures.len(),
                total: set.attempted(),
            }
            .into());
        }

        let mut result = self.aggregate(&set.samples);
        result.failed_samples = set.failures.len();
        result.own_lookup_failed = set.failures.iter().any(|failure| {
            failure.stage == SampleStage::EventNonce && failure.subject.trim() == self.own_address
        });
        Ok(result)
    }

    pub fn aggregate(&self, samples: &[EventNonceSample]) -> AggregationResult {
        let highest_nonce = samples.iter().map(|s| s.nonce).max().unwrap_or(0);
        let own = samples
            .iter()
            .find(|s| s.orchestrator.trim() == self.own_address);
        let own_nonce = own.map(|s| s.nonce).unwrap_or(0);

        let peers_ahead_count = samples.iter().filter(|s| s.nonce > own_nonce).count();
        let peers_ahead_fraction = if samples.is_empty() {
            None
        } else {
            Some(peers_ahead_count as f64 / samples.len() as f64)
        };

        let verdict = if own_nonce == highest_nonce {
            SyncVerdict::InSync
        } else {
            SyncVerdict::Behind
        };

        AggregationResult {
            own_nonce,
            own_found: own.is_some(),
            own_lookup_failed: false,
            highest_nonce,
            nonces: samples.iter().map(|s| s.nonce).collect(),
            peers_ahead_count,
            peers_ahead_fraction,
            verdict,
            failed_samples: 0,
            timestamp: unix_now(),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
