//! REST client for the Cosmos staking and gravity query endpoints. Houses the
//! `RestClient`, its error type, and the `GravityQuery` trait consumed by the
//! collection pipeline.

use crate::rest::metrics::{RestMetrics, RestMetricsSnapshot};
use crate::rest::options::RestClientOptions;
use crate::rest::retry::{
    RetryContext, DELEGATE_KEYS_RETRY, EVENT_NONCE_RETRY, VALIDATORS_RETRY,
};
use crate::rest::types::{
    DelegateKeysResponse, EventNonceResponse, ValidatorsResponse, BONDED_VALIDATORS_PATH,
    BOND_STATUS_BONDED, DELEGATE_KEYS_PATH, EVENT_NONCE_PATH,
};
use crate::runtime::config::ExporterConfig;
use anyhow::{anyhow, bail, Result};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::{future::Future, sync::Arc};
use tokio::time::{sleep, Instant};

/// Broad failure classes: transport problems versus unusable response bodies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    Transport,
    Decode,
}

#[derive(Debug)]
pub enum RestError {
    Transport { path: String, message: String },
    Timeout { path: String },
    Status { path: String, status: u16 },
    Decode { path: String, message: String },
    MissingOrchestrator { validator: String },
    InvalidNonce { orchestrator: String, value: String },
}

impl RestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RestError::Transport { .. } | RestError::Timeout { .. } | RestError::Status { .. } => {
                ErrorClass::Transport
            }
            RestError::Decode { .. }
            | RestError::MissingOrchestrator { .. }
            | RestError::InvalidNonce { .. } => ErrorClass::Decode,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RestError::Transport { .. } | RestError::Timeout { .. } => true,
            RestError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestError::Transport { path, message } => {
                write!(f, "GET {path} failed: {message}")
            }
            RestError::Timeout { path } => write!(f, "GET {path} timed out"),
            RestError::Status { path, status } => {
                write!(f, "GET {path} returned HTTP status {status}")
            }
            RestError::Decode { path, message } => {
                write!(f, "GET {path} returned an undecodable body: {message}")
            }
            RestError::MissingOrchestrator { validator } => {
                write!(f, "validator {validator} has no registered orchestrator address")
            }
            RestError::InvalidNonce {
                orchestrator,
                value,
            } => write!(
                f,
                "orchestrator {orchestrator} reported a non-numeric event nonce {value:?}"
            ),
        }
    }
}

impl std::error::Error for RestError {}

impl ErrorClass {
    /// Class of a failure raised by the REST client, looking through added context.
    pub fn of(err: &anyhow::Error) -> Option<Self> {
        err.downcast_ref::<RestError>().map(RestError::class)
    }
}

/// Queries the collection pipeline needs from a node.
pub trait GravityQuery: Send + Sync {
    /// Operator addresses of every bonded validator.
    fn bonded_validators(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Orchestrator address registered by `validator` through its delegate keys.
    fn orchestrator_address<'a>(&'a self, validator: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Latest event nonce observed by `orchestrator`.
    fn last_event_nonce<'a>(&'a self, orchestrator: &'a str) -> BoxFuture<'a, Result<u64>>;
}

#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: Arc<String>,
    client: reqwest::Client,
    options: RestClientOptions,
    metrics: Arc<RestMetrics>,
}

impl GravityQuery for RestClient {
    fn bonded_validators(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.bonded_validators())
    }

    fn orchestrator_address<'a>(&'a self, validator: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.orchestrator_address(validator))
    }

    fn last_event_nonce<'a>(&'a self, orchestrator: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(self.last_event_nonce(orchestrator))
    }
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, RestClientOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, options: RestClientOptions) -> Result<Self> {
        options.validate()?;

        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("rest url must start with http:// or https://");
        }

        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| anyhow!("failed to build REST client: {err}"))?;

        Ok(Self {
            base_url: Arc::new(base_url),
            client,
            options,
            metrics: Arc::new(RestMetrics::default()),
        })
    }

    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        config.validate()?;
        Self::with_options(config.rest_url().to_owned(), config.rest_options())
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> RestMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn bonded_validators(&self) -> Result<Vec<String>> {
        let mut addresses = Vec::new();
        let mut seen_keys = HashSet::new();
        let mut page_key: Option<String> = None;

        loop {
            let mut query = vec![("status", BOND_STATUS_BONDED.to_owned())];
            if let Some(key) = &page_key {
                query.push(("pagination.key", key.clone()));
            }

            let page: ValidatorsResponse = self
                .get_json(
                    RetryContext::new(&VALIDATORS_RETRY),
                    BONDED_VALIDATORS_PATH,
                    &query,
                )
                .await?;

            addresses.extend(
                page.validators
                    .iter()
                    .map(|entry| entry.operator_address.trim().to_owned()),
            );

            match page.next_key() {
                Some(key) => {
                    if !seen_keys.insert(key.to_owned()) {
                        bail!("validator pagination repeated next_key {key:?}");
                    }
                    page_key = Some(key.to_owned());
                }
                None => break,
            }
        }

        tracing::debug!(validators = addresses.len(), "fetched bonded validators");
        Ok(addresses)
    }

    pub async fn orchestrator_address(&self, validator: &str) -> Result<String> {
        let keys: DelegateKeysResponse = self
            .get_json(
                RetryContext::with_subject(&DELEGATE_KEYS_RETRY, validator),
                DELEGATE_KEYS_PATH,
                &[("validator_address", validator.to_owned())],
            )
            .await?;

        let orchestrator = keys.orchestrator_address.trim();
        if orchestrator.is_empty() {
            return Err(RestError::MissingOrchestrator {
                validator: validator.to_owned(),
            }
            .into());
        }
        Ok(orchestrator.to_owned())
    }

    pub async fn last_event_nonce(&self, orchestrator: &str) -> Result<u64> {
        let path = format!("{EVENT_NONCE_PATH}/{orchestrator}");
        let response: EventNonceResponse = self
            .get_json(
                RetryContext::with_subject(&EVENT_NONCE_RETRY, orchestrator),
                &path,
                &[],
            )
            .await?;

        response.parse_nonce().ok_or_else(|| {
            RestError::InvalidNonce {
                orchestrator: orchestrator.to_owned(),
                value: response.event_nonce.clone(),
            }
            .into()
        })
    }

    /// GET `{base}{path}` and decode the JSON body, retrying transient failures.
    pub(crate) async fn get_json<T>(
        &self,
        context: RetryContext<'_>,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.retry_with_backoff(context, || self.get_once(path, query))
            .await
    }

    async fn get_once<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|err| map_transport_error(path, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RestError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| map_transport_error(path, err))?;

        serde_json::from_slice(&body).map_err(|err| {
            RestError::Decode {
                path: path.to_owned(),
                message: err.to_string(),
            }
            .into()
        })
    }

    /// Shared retry loop wrapping every request with metrics, capped
    /// exponential backoff, and consistent logging.
    async fn retry_with_backoff<T, F, Fut>(
        &self,
        context: RetryContext<'_>,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match operation().await {
                Ok(value) => {
                    self.metrics.record_success(start.elapsed());
                    tracing::trace!(endpoint = context.endpoint(), attempt, "request succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    let elapsed = start.elapsed();
                    let rest_error = err.downcast_ref::<RestError>();

                    if matches!(rest_error, Some(RestError::Timeout { .. })) {
                        self.metrics.record_timeout(elapsed);
                    } else {
                        self.metrics.record_failure(elapsed);
                    }

                    if !rest_error.is_some_and(RestError::is_retryable) {
                        context.log_rejected(attempt, &err);
                        return Err(err);
                    }

                    if attempt >= self.options.max_attempts {
                        context.log_exhausted(attempt, &err);
                        return Err(err);
                    }

                    let backoff = self.options.backoff_delay(attempt);
                    context.log_retry(attempt, backoff, &err);
                    sleep(backoff).await;
                }
            }
        }
    }
}

fn map_transport_error(path: &str, err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        return RestError::Timeout {
            path: path.to_owned(),
        }
        .into();
    }
    if err.is_decode() {
        return RestError::Decode {
            path: path.to_owned(),
            message: err.to_string(),
        }
        .into();
    }
    RestError::Transport {
        path: path.to_owned(),
        message: err.to_string(),
    }
    .into()
}
