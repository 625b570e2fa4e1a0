pub mod collector;
pub mod rest;
pub mod runtime;

pub use collector::{AggregationResult, CollectError, Exporter, SyncVerdict};
pub use rest::{GravityQuery, RestClient, RestClientOptions, RestError, RestMetricsSnapshot};
pub use runtime::config::{ExporterConfig, ExporterConfigBuilder, ExporterConfigParams};
pub use runtime::runner::Runner;
pub use runtime::server::{MetricsServer, ServerState};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
