use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use peggo_exporter::{ExporterConfig, MetricsServer, ServerState};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Config pointed at `rest_url` with fast retries and an ephemeral listener.
pub fn test_config(rest_url: &str, own: &str) -> Result<ExporterConfig> {
    ExporterConfig::builder()
        .rest_url(rest_url)
        .orchestrator_address(own)
        .request_timeout(Duration::from_secs(2))
        .max_attempts(2)
        .initial_backoff(Duration::from_millis(5))
        .max_backoff(Duration::from_millis(10))
        .concurrency(4)
        .listen_address("127.0.0.1:0")
        .build()
}

/// A metrics server running in the background until dropped via `stop`.
pub struct RunningExporter {
    url: String,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl RunningExporter {
    pub async fn start(config: &ExporterConfig) -> Result<Self> {
        let state = ServerState::from_config(config)?;
        let server = MetricsServer::bind(&config.bind_addresses(), state).await?;
        let url = format!("http://{}", server.local_addr());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));
        Ok(Self {
            url,
            shutdown,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub async fn scrape(&self) -> Result<String> {
        let response = reqwest::get(self.url("/metrics"))
            .await
            .context("scrape request failed")?
            .error_for_status()
            .context("scrape returned an error status")?;
        response.text().await.context("scrape body unreadable")
    }

    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.handle.await??;
        Ok(())
    }
}

/// Value of the single sample of `name` in a text exposition.
pub fn sample(text: &str, name: &str) -> Option<f64> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (metric, value) = line.split_once(' ')?;
            (metric == name).then(|| value.trim().parse().ok()).flatten()
        })
}

pub fn core_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| line.starts_with("peggo_peggo_"))
        .collect()
}
