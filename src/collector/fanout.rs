//! Bounded, order-preserving fan-out of per-item lookups.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Result of one lookup, tagged with the item it was about.
#[derive(Debug)]
pub struct Outcome<T> {
    pub subject: String,
    pub result: Result<T>,
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs `lookup` for every subject with at most `concurrency` lookups in
/// flight. Outcomes come back in input order, one per subject.
pub(crate) async fn fan_out<T, F, Fut>(
    subjects: Vec<String>,
    concurrency: usize,
    mut lookup: F,
) -> Vec<Outcome<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(subjects)
        .map(|subject| {
            let pending = lookup(subject.clone());
            async move {
                Outcome {
                    result: pending.await,
                    subject,
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
