//! In-memory `GravityQuery` used by the collector unit tests.

use crate::rest::client::{GravityQuery, RestError};
use anyhow::{bail, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub(crate) struct FakeQuery {
    validators: Vec<String>,
    orchestrators: HashMap<String, String>,
    nonces: HashMap<String, u64>,
    validators_down: bool,
    pub validator_calls: AtomicUsize,
    pub delegate_calls: AtomicUsize,
    pub nonce_calls: AtomicUsize,
}

impl FakeQuery {
    /// Registers `validator -> orchestrator -> nonce`, in validator order.
    pub fn with_orchestrator(mut self, validator: &str, orchestrator: &str, nonce: u64) -> Self {
        self.validators.push(validator.to_owned());
        self.orchestrators
            .insert(validator.to_owned(), orchestrator.to_owned());
        self.nonces.insert(orchestrator.to_owned(), nonce);
        self
    }

    /// Registers a validator whose orchestrator resolves but has no nonce.
    pub fn without_nonce(mut self, validator: &str, orchestrator: &str) -> Self {
        self.validators.push(validator.to_owned());
        self.orchestrators
            .insert(validator.to_owned(), orchestrator.to_owned());
        self
    }

    /// Registers a validator without delegate keys.
    pub fn without_keys(mut self, validator: &str) -> Self {
        self.validators.push(validator.to_owned());
        self
    }

    pub fn validators_down(mut self) -> Self {
        self.validators_down = true;
        self
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.validator_calls.load(Ordering::SeqCst),
            self.delegate_calls.load(Ordering::SeqCst),
            self.nonce_calls.load(Ordering::SeqCst),
        )
    }
}

impl GravityQuery for FakeQuery {
    fn bonded_validators(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            self.validator_calls.fetch_add(1, Ordering::SeqCst);
            if self.validators_down {
                bail!(RestError::Status {
                    path: "validators".into(),
                    status: 503,
                });
            }
            Ok(self.validators.clone())
        })
    }

    fn orchestrator_address<'a>(&'a self, validator: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.delegate_calls.fetch_add(1, Ordering::SeqCst);
            match self.orchestrators.get(validator) {
                Some(orchestrator) => Ok(orchestrator.clone()),
                None => Err(RestError::MissingOrchestrator {
                    validator: validator.to_owned(),
                }
                .into()),
            }
        })
    }

    fn last_event_nonce<'a>(&'a self, orchestrator: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            self.nonce_calls.fetch_add(1, Ordering::SeqCst);
            match self.nonces.get(orchestrator) {
                Some(nonce) => Ok(*nonce),
                None => Err(RestError::Status {
                    path: format!("eventnonce/{orchestrator}"),
                    status: 500,
                }
                .into()),
            }
        })
    }
}
