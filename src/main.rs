use anyhow::Result;
use clap::Parser;
use peggo_exporter::runtime::config::{
    parse_duration, DEFAULT_CONCURRENCY, DEFAULT_LISTEN_ADDRESS, DEFAULT_METRICS_PATH,
    DEFAULT_REST_URL,
};
use peggo_exporter::{init_tracing, ExporterConfig, Runner};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "peggo-exporter", version, about = "Prometheus exporter for peggo orchestrator event nonces")]
struct Args {
    /// Base URL of the node's REST API.
    #[arg(long = "peggo.peggo-rest-rpc", env = "PEGGO_REST_RPC", default_value = DEFAULT_REST_URL)]
    rest_rpc: String,

    /// Orchestrator address whose sync status is reported.
    #[arg(long = "peggo.cosmos-orchestrator-address", env = "COSMOS_ORCHESTRATOR_ADDRESS")]
    orchestrator_address: String,

    /// Per-request timeout, as seconds or a duration such as `5s` or `500ms`.
    #[arg(long = "peggo.timeout", env = "PEGGO_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    timeout: Duration,

    #[arg(long = "peggo.max-attempts", env = "PEGGO_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: usize,

    #[arg(long = "peggo.initial-backoff-ms", env = "PEGGO_INITIAL_BACKOFF_MS", default_value_t = 200)]
    initial_backoff_ms: u64,

    #[arg(long = "peggo.max-backoff-ms", env = "PEGGO_MAX_BACKOFF_MS", default_value_t = 2_000)]
    max_backoff_ms: u64,

    /// Maximum number of REST lookups in flight per stage.
    #[arg(long = "peggo.concurrency", env = "PEGGO_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Report metrics from the orchestrators that answered even if others failed.
    #[arg(long = "peggo.allow-partial-samples", env = "PEGGO_ALLOW_PARTIAL_SAMPLES")]
    allow_partial_samples: bool,

    #[arg(long = "web.listen-address", env = "EXPORTER_WEB_LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    listen_address: String,

    #[arg(long = "web.telemetry-path", env = "EXPORTER_WEB_TELEMETRY_PATH", default_value = DEFAULT_METRICS_PATH)]
    telemetry_path: String,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long = "log.level", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ExporterConfig> {
        ExporterConfig::builder()
            .rest_url(self.rest_rpc)
            .orchestrator_address(self.orchestrator_address)
            .request_timeout(self.timeout)
            .max_attempts(self.max_attempts)
            .initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .max_backoff(Duration::from_millis(self.max_backoff_ms))
            .concurrency(self.concurrency)
            .allow_partial_samples(self.allow_partial_samples)
            .listen_address(self.listen_address)
            .metrics_path(self.telemetry_path)
            .build()
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = args.into_config()?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting peggo-exporter");

    let mut runner = Runner::new(config);
    runner.run_until_ctrl_c().await
}
