//! Collection pipeline: validator resolution, nonce sampling, aggregation,
//! and rendering of the core gauge families.

pub mod aggregate;
pub mod exporter;
pub mod fanout;
pub mod resolver;
pub mod sampler;

#[cfg(test)]
pub(crate) mod fake;

pub use aggregate::{
    AggregationResult, CollectError, EventNonceSample, SampleFailure, SampleSet, SampleStage,
    SyncAggregator, SyncVerdict,
};
pub use exporter::{render, Exporter};
pub use fanout::Outcome;
pub use resolver::ValidatorResolver;
pub use sampler::NonceSampler;
