use crate::rest::options::{
    RestClientOptions, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use anyhow::{bail, Context, Result};
use std::time::Duration;

pub const DEFAULT_REST_URL: &str = "http://localhost:1317";
pub const DEFAULT_LISTEN_ADDRESS: &str = ":5566";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Runtime configuration for the exporter.
///
/// All instances must be constructed via [`ExporterConfig::builder`] or [`ExporterConfig::new`]
/// so invariants are validated before any scrape observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    rest_url: String,
    orchestrator_address: String,
    request_timeout: Duration,
    max_attempts: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
    concurrency: usize,
    allow_partial_samples: bool,
    listen_address: String,
    metrics_path: String,
}

pub struct ExporterConfigParams {
    pub rest_url: String,
    pub orchestrator_address: String,
    pub request_timeout: Duration,
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub concurrency: usize,
    pub allow_partial_samples: bool,
    pub listen_address: String,
    pub metrics_path: String,
}

impl ExporterConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: ExporterConfigParams) -> Result<Self> {
        let ExporterConfigParams {
            rest_url,
            orchestrator_address,
            request_timeout,
            max_attempts,
            initial_backoff,
            max_backoff,
            concurrency,
            allow_partial_samples,
            listen_address,
            metrics_path,
        } = params;

        let config = Self {
            rest_url: trimmed_string(rest_url).trim_end_matches('/').to_owned(),
            orchestrator_address: trimmed_string(orchestrator_address),
            request_timeout,
            max_attempts,
            initial_backoff,
            max_backoff,
            concurrency,
            allow_partial_samples,
            listen_address: parse_listen_address(&listen_address)?,
            metrics_path: trimmed_string(metrics_path),
        };

        config.validate()?;
        Ok(config)
    }

    /// Base URL of the node's REST API.
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    /// Orchestrator whose sync state is reported.
    pub fn orchestrator_address(&self) -> &str {
        &self.orchestrator_address
    }

    /// Timeout applied to every individual REST request.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Maximum number of lookups in flight while fanning out over validators.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether a cycle with failed lookups still reports the samples it got.
    pub fn allow_partial_samples(&self) -> bool {
        self.allow_partial_samples
    }

    /// Listen address as configured, `host:port` or the `:port` shorthand.
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    /// Addresses to try, in order, when binding the metrics listener. The
    /// `:port` shorthand binds every interface, dual-stack where available.
    pub fn bind_addresses(&self) -> Vec<String> {
        match self.listen_address.strip_prefix(':') {
            Some(port) => vec![format!("[::]:{port}"), format!("0.0.0.0:{port}")],
            None => vec![self.listen_address.clone()],
        }
    }

    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    pub fn rest_options(&self) -> RestClientOptions {
        RestClientOptions {
            request_timeout: self.request_timeout,
            max_attempts: self.max_attempts,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
        }
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.rest_url)?;
        ensure_not_empty(&self.orchestrator_address, "orchestrator_address")?;

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if self.max_attempts == 0 {
            bail!("max_attempts must be greater than 0");
        }

        if self.initial_backoff.is_zero() {
            bail!("initial_backoff must be greater than 0");
        }

        if self.max_backoff < self.initial_backoff {
            bail!("max_backoff must not be smaller than initial_backoff");
        }

        if self.concurrency == 0 {
            bail!("concurrency must be greater than 0");
        }

        if !self.metrics_path.starts_with('/') || self.metrics_path == "/" {
            bail!("metrics_path must start with / and must not be the root path");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExporterConfigBuilder {
    rest_url: Option<String>,
    orchestrator_address: Option<String>,
    request_timeout: Option<Duration>,
    max_attempts: Option<usize>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    concurrency: Option<usize>,
    allow_partial_samples: Option<bool>,
    listen_address: Option<String>,
    metrics_path: Option<String>,
}

impl ExporterConfigBuilder {
    pub fn rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = Some(url.into());
        self
    }

    pub fn orchestrator_address(mut self, address: impl Into<String>) -> Self {
        self.orchestrator_address = Some(address.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn allow_partial_samples(mut self, allow: bool) -> Self {
        self.allow_partial_samples = Some(allow);
        self
    }

    pub fn listen_address(mut self, address: impl Into<String>) -> Self {
        self.listen_address = Some(address.into());
        self
    }

    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ExporterConfig> {
        let params = ExporterConfigParams {
            rest_url: self.rest_url.unwrap_or_else(|| DEFAULT_REST_URL.to_owned()),
            orchestrator_address: self
                .orchestrator_address
                .context("orchestrator_address is required")?,
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            initial_backoff: self
                .initial_backoff
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS)),
            max_backoff: self
                .max_backoff
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_MAX_BACKOFF_MS)),
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            allow_partial_samples: self.allow_partial_samples.unwrap_or(false),
            listen_address: self
                .listen_address
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_owned()),
            metrics_path: self
                .metrics_path
                .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_owned()),
        };

        ExporterConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("rest_url must start with http:// or https://");
    }
    Ok(())
}

/// Parses a duration given either as bare seconds (`5`, `2.5`) or in Go
/// notation (`5s`, `500ms`, `1m30s`). Out-of-range values are errors.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        bail!("duration cannot be empty");
    }
    if let Ok(seconds) = value.parse::<f64>() {
        return seconds_to_duration(seconds, value);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let unit_end = rest[number_end..]
            .find(is_number)
            .map_or(rest.len(), |offset| number_end + offset);
        let (number, unit) = (&rest[..number_end], &rest[number_end..unit_end]);

        let amount: f64 = number
            .parse()
            .with_context(|| format!("invalid duration {value:?}"))?;
        let scale = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3_600.0,
            _ => bail!("invalid duration {value:?}: unknown unit {unit:?}"),
        };
        let part = seconds_to_duration(amount * scale, value)?;
        total = total
            .checked_add(part)
            .with_context(|| format!("duration {value:?} is out of range"))?;
        rest = &rest[unit_end..];
    }
    Ok(total)
}

fn seconds_to_duration(seconds: f64, value: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("duration {value:?} is out of range"))
}

/// Accepts `host:port` with a hostname or IP (IPv6 in brackets) as well as
/// the `:port` shorthand. Hostnames are resolved when the listener binds.
fn parse_listen_address(address: &str) -> Result<String> {
    let address = address.trim();
    let Some((host, port)) = address.rsplit_once(':') else {
        bail!("listen_address {address:?} must be host:port or :port");
    };
    port.parse::<u16>()
        .with_context(|| format!("listen_address {address:?} has an invalid port"))?;

    let bracketed = host.starts_with('[') && host.ends_with(']');
    if host.contains(char::is_whitespace) || (host.contains(':') && !bracketed) {
        bail!("listen_address {address:?} has an invalid host");
    }
    Ok(address.to_owned())
}
