//! Batch execution.
//!
//! A batch is an ordered list of segment keys. Both runners return exactly one
//! outcome per key, in input order, and a skipped segment never stops the ones
//! after it.
//!
//! [`run_batch_concurrent`] moves each segment onto tokio's blocking pool,
//! keeps at most `concurrency` in flight and bounds each by an optional time
//! budget. The in-flight bound is a semaphore permit owned by the blocking
//! task, so a timed-out segment holds its slot until its work really stops.
//! `buffered` yields results in submission order, so the collected list lines
//! up with the keys without any shared mutable state.

use crate::config::BatchConfig;
use crate::outcome::{SegmentOutcome, SkipReason};
use crate::pipeline::SegmentPipeline;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tally_data::{Panel, SegmentKey};
use tally_models::CancelFlag;
use tokio::sync::Semaphore;
use tracing::{info, warn};

impl SegmentPipeline {
    /// Run every key in order on the current thread.
    pub fn run_batch(&self, panel: &Panel, keys: &[SegmentKey]) -> Vec<SegmentOutcome> {
        self.run_batch_with_progress(panel, keys, |_| {})
    }

    /// Run every key in order, calling `on_outcome` after each segment.
    pub fn run_batch_with_progress<F>(
        &self,
        panel: &Panel,
        keys: &[SegmentKey],
        mut on_outcome: F,
    ) -> Vec<SegmentOutcome>
    where
        F: FnMut(&SegmentOutcome),
    {
        let outcomes: Vec<SegmentOutcome> = keys
            .iter()
            .map(|key| {
                let outcome = self.run_segment(panel, *key);
                on_outcome(&outcome);
                outcome
            })
            .collect();

        log_batch(&outcomes);
        outcomes
    }
}

/// Run every key on the blocking pool with bounded concurrency.
///
/// A segment that exceeds `config.timeout_ms` becomes
/// [`SkipReason::Timeout`] and its fit is asked to stop through a
/// [`CancelFlag`]. The segment keeps its concurrency slot until the blocking
/// work has actually returned, so no more than `config.concurrency` segments
/// ever run at once.
pub async fn run_batch_concurrent(
    pipeline: &SegmentPipeline,
    panel: Arc<Panel>,
    keys: &[SegmentKey],
    config: &BatchConfig,
) -> Vec<SegmentOutcome> {
    run_batch_concurrent_with_progress(pipeline, panel, keys, config, |_| {}).await
}

/// [`run_batch_concurrent`], calling `on_outcome` as each result is collected.
pub async fn run_batch_concurrent_with_progress<F>(
    pipeline: &SegmentPipeline,
    panel: Arc<Panel>,
    keys: &[SegmentKey],
    config: &BatchConfig,
    mut on_outcome: F,
) -> Vec<SegmentOutcome>
where
    F: FnMut(&SegmentOutcome),
{
    let concurrency = config.concurrency.max(1);
    let timeout = config.timeout();
    let slots = Arc::new(Semaphore::new(concurrency));

    let outcomes: Vec<SegmentOutcome> = stream::iter(keys.iter().copied())
        .map(|key| {
            let pipeline = pipeline.clone();
            let panel = Arc::clone(&panel);
            let slots = Arc::clone(&slots);
            async move {
                let permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return failed(key, format!("no worker slot: {e}")),
                };

                let cancel = CancelFlag::new();
                let worker_cancel = cancel.clone();
                let task = tokio::task::spawn_blocking(move || {
                    // Released only once the segment's work has finished.
                    let _permit = permit;
                    pipeline.run_segment_until(&panel, key, &worker_cancel)
                });

                let joined = match timeout {
                    Some(budget) => match tokio::time::timeout(budget, task).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            cancel.cancel();
                            let reason = SkipReason::Timeout {
                                budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                            };
                            warn!(%key, %reason, "segment skipped");
                            return SegmentOutcome::Skipped { key, reason };
                        }
                    },
                    None => task.await,
                };
                joined.unwrap_or_else(|e| failed(key, format!("segment task failed: {e}")))
            }
        })
        .buffered(concurrency)
        .inspect(|outcome| on_outcome(outcome))
        .collect()
        .await;

    // Cancelled work may still hold slots; wait for it before returning.
    let _drained = slots.acquire_many(permits(concurrency)).await;

    log_batch(&outcomes);
    outcomes
}

fn failed(key: SegmentKey, message: String) -> SegmentOutcome {
    let reason = SkipReason::ModelFailure { message };
    warn!(%key, %reason, "segment skipped");
    SegmentOutcome::Skipped { key, reason }
}

fn permits(concurrency: usize) -> u32 {
    u32::try_from(concurrency).unwrap_or(u32::MAX)
}

fn log_batch(outcomes: &[SegmentOutcome]) {
    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    info!(
        segments = outcomes.len(),
        completed,
        skipped = outcomes.len() - completed,
        "batch finished"
    );
}
