//! Resolves every bonded validator to its registered orchestrator address.

use crate::collector::fanout::{fan_out, Outcome};
use crate::rest::client::{ErrorClass, GravityQuery};
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ValidatorResolver {
    query: Arc<dyn GravityQuery>,
    concurrency: usize,
}

impl ValidatorResolver {
    pub fn new(query: Arc<dyn GravityQuery>, concurrency: usize) -> Self {
        Self {
            query,
            concurrency: concurrency.max(1),
        }
    }

    /// Lists bonded validators, then looks up each one's orchestrator.
    ///
    /// A failed validator listing aborts the resolution. Per-validator
    /// failures are returned as outcomes, one per validator, in listing order.
    pub async fn resolve(&self) -> Result<Vec<Outcome<String>>> {
        let validators = self
            .query
            .bonded_validators()
            .await
            .context("failed to list bonded validators")?;

        tracing::debug!(
            validators = validators.len(),
            concurrency = self.concurrency,
            "resolving orchestrator addresses"
        );

        let query = Arc::clone(&self.query);
        let outcomes = fan_out(validators, self.concurrency, move |validator| {
            let query = Arc::clone(&query);
            async move { query.orchestrator_address(&validator).await }
        })
        .await;

        for outcome in outcomes.iter().filter(|outcome| !outcome.is_ok()) {
            if let Err(err) = &outcome.result {
                tracing::warn!(
                    validator = %outcome.subject,
                    error_class = ?ErrorClass::of(err),
                    error = %err,
                    "orchestrator lookup failed"
                );
            }
        }

        Ok(outcomes)
    }
}
