//! Fetches the latest event nonce for each resolved orchestrator.

use crate::collector::aggregate::{EventNonceSample, SampleFailure, SampleSet, SampleStage};
use crate::collector::fanout::{fan_out, Outcome};
use crate::rest::client::{ErrorClass, GravityQuery};
use std::sync::Arc;

#[derive(Clone)]
pub struct NonceSampler {
    query: Arc<dyn GravityQuery>,
    concurrency: usize,
}

impl NonceSampler {
    pub fn new(query: Arc<dyn GravityQuery>, concurrency: usize) -> Self {
        Self {
            query,
            concurrency: concurrency.max(1),
        }
    }

    /// Samples every resolved orchestrator. Validators whose resolution failed
    /// are carried over as failures without issuing a nonce request.
    pub async fn sample(&self, resolutions: Vec<Outcome<String>>) -> SampleSet {
        let mut set = SampleSet::default();
        let mut orchestrators = Vec::with_capacity(resolutions.len());

        for outcome in resolutions {
            match outcome.result {
                Ok(orchestrator) => orchestrators.push(orchestrator),
                Err(err) => set.failures.push(SampleFailure {
                    subject: outcome.subject,
                    stage: SampleStage::DelegateKeys,
                    class: ErrorClass::of(&err),
                    error: format!("{err:#}"),
                }),
            }
        }

        let query = Arc::clone(&self.query);
        let outcomes = fan_out(orchestrators, self.concurrency, move |orchestrator| {
            let query = Arc::clone(&query);
            async move { query.last_event_nonce(&orchestrator).await }
        })
        .await;

        for outcome in outcomes {
            match outcome.result {
                Ok(nonce) => set
                    .samples
                    .push(EventNonceSample::new(outcome.subject, nonce)),
                Err(err) => {
                    let class = ErrorClass::of(&err);
                    tracing::warn!(
                        orchestrator = %outcome.subject,
                        error_class = ?class,
                        error = %err,
                        "event nonce lookup failed"
                    );
                    set.failures.push(SampleFailure {
                        subject: outcome.subject,
                        stage: SampleStage::EventNonce,
                        class,
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        set
    }
}
