//! REST client plumbing for the Cosmos node: typed responses, request
//! metrics, retry policy, and the query trait the collector runs against.

pub mod client;
pub(crate) mod metrics;
pub mod options;
pub(crate) mod retry;
pub mod types;

pub use client::{ErrorClass, GravityQuery, RestClient, RestError};
pub use metrics::RestMetricsSnapshot;
pub use options::RestClientOptions;
