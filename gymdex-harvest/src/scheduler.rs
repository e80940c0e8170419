//! Adaptive batch scheduling
//!
//! Splits the target list into batches and bounds in-flight work inside a
//! batch with a counting semaphore: acquire a permit, run the item, drop
//! the permit on completion, success or failure. Between batches the
//! scheduler sleeps, emits progress, and adapts the batch size:
//! consecutive bad batches halve it down to a floor, consecutive clean
//! batches double it back up to the configured size. Cancellation is
//! honored between batches and between items, so a cancelled run returns
//! whatever completed.

use crate::config::BatchConfig;
use crate::types::SearchTarget;
use gymdex_common::events::{EventBus, HarvestEvent};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One worker result: the payload plus whether the target counts as
/// successfully resolved for adaptive sizing
pub struct JobOutcome<T> {
    pub value: T,
    pub success: bool,
}

impl<T> JobOutcome<T> {
    pub fn success(value: T) -> Self {
        Self {
            value,
            success: true,
        }
    }

    pub fn failure(value: T) -> Self {
        Self {
            value,
            success: false,
        }
    }
}

/// What a scheduler run produced
pub struct BatchRunReport<T> {
    /// Worker payloads in input order (a cancelled run holds a prefix)
    pub results: Vec<T>,
    /// Targets dispatched to workers
    pub attempted: usize,
    /// Targets whose worker reported success
    pub succeeded: usize,
    /// Whether the run stopped on cancellation
    pub cancelled: bool,
    /// Batch size in force when the run ended
    pub final_batch_size: usize,
}

pub struct BatchScheduler {
    config: BatchConfig,
    events: Option<EventBus>,
    session_id: Option<Uuid>,
}

impl BatchScheduler {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            events: None,
            session_id: None,
        }
    }

    /// Attach an event bus; batch and progress events are published to it
    pub fn with_events(mut self, events: EventBus, session_id: Uuid) -> Self {
        self.events = Some(events);
        self.session_id = Some(session_id);
        self
    }

    /// Run `worker` over every target in adaptive batches
    pub async fn run<T, F, Fut>(
        &self,
        targets: Vec<SearchTarget>,
        cancel: &CancellationToken,
        worker: F,
    ) -> BatchRunReport<T>
    where
        T: Send + 'static,
        F: Fn(SearchTarget) -> Fut,
        Fut: Future<Output = JobOutcome<T>> + Send + 'static,
    {
        let total = targets.len();
        let started = Instant::now();
        let concurrency = self.config.concurrency.max(1);
        let mut batch_size = self.config.batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut queue: VecDeque<SearchTarget> = targets.into();
        let mut report = BatchRunReport {
            results: Vec::with_capacity(total),
            attempted: 0,
            succeeded: 0,
            cancelled: false,
            final_batch_size: batch_size,
        };
        let mut consecutive_failed = 0u32;
        let mut consecutive_clean = 0u32;
        let mut batch_index = 0usize;

        while !queue.is_empty() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if batch_index > 0 && self.config.inter_batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_batch_delay_ms)).await;
            }

            let take = batch_size.min(queue.len());
            let batch: Vec<SearchTarget> = queue.drain(..take).collect();
            let attempted = batch.len();

            let mut join_set: JoinSet<(usize, JobOutcome<T>)> = JoinSet::new();
            for (slot, target) in batch.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    break;
                }
                // Blocks until an in-flight item frees a slot
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                if cancel.is_cancelled() {
                    break;
                }

                let job = worker(target);
                join_set.spawn(async move {
                    let outcome = job.await;
                    drop(permit);
                    (slot, outcome)
                });
            }

            let mut batch_results: Vec<(usize, JobOutcome<T>)> = Vec::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(pair) => batch_results.push(pair),
                    Err(e) => warn!(error = %e, "Batch worker task failed"),
                }
            }
            batch_results.sort_by_key(|(slot, _)| *slot);

            let completed = batch_results.len();
            let succeeded = batch_results.iter().filter(|(_, job)| job.success).count();
            for (_, job) in batch_results {
                report.results.push(job.value);
            }
            report.attempted += completed;
            report.succeeded += succeeded;

            debug!(
                batch_index = batch_index,
                attempted = attempted,
                completed = completed,
                succeeded = succeeded,
                batch_size = batch_size,
                "Batch finished"
            );
            self.publish_batch(
                batch_index,
                batch_size,
                queue.len(),
                succeeded,
                completed,
                report.attempted,
                total,
                &started,
            );

            batch_size = self.adapt_batch_size(
                batch_size,
                succeeded,
                completed,
                &mut consecutive_failed,
                &mut consecutive_clean,
            );
            batch_index += 1;
        }

        report.final_batch_size = batch_size;
        if report.cancelled {
            info!(
                processed = report.attempted,
                total = total,
                "Batch run cancelled, returning partial results"
            );
        }
        report
    }

    /// Shrink on repeated bad batches, grow back on repeated clean ones
    fn adapt_batch_size(
        &self,
        current: usize,
        succeeded: usize,
        completed: usize,
        consecutive_failed: &mut u32,
        consecutive_clean: &mut u32,
    ) -> usize {
        if completed == 0 {
            return current;
        }
        let failure_rate = 1.0 - (succeeded as f32 / completed as f32);

        if failure_rate > self.config.failure_threshold {
            *consecutive_failed += 1;
            *consecutive_clean = 0;
            if *consecutive_failed >= self.config.shrink_after_failed_batches.max(1) {
                *consecutive_failed = 0;
                let floor = self.config.min_batch_size.max(1);
                let shrunk = (current / 2).max(floor);
                if shrunk < current {
                    warn!(
                        from = current,
                        to = shrunk,
                        failure_rate = failure_rate,
                        "Repeated bad batches, shrinking batch size"
                    );
                    return shrunk;
                }
            }
        } else {
            *consecutive_clean += 1;
            *consecutive_failed = 0;
            if *consecutive_clean >= self.config.grow_after_successful_batches.max(1) {
                *consecutive_clean = 0;
                let cap = self.config.batch_size.max(1);
                let grown = (current * 2).min(cap);
                if grown > current {
                    info!(from = current, to = grown, "Batches look healthy, growing batch size");
                    return grown;
                }
            }
        }
        current
    }

    #[allow(clippy::too_many_arguments)]
    fn publish_batch(
        &self,
        batch_index: usize,
        batch_size: usize,
        remaining: usize,
        succeeded: usize,
        attempted: usize,
        current: usize,
        total: usize,
        started: &Instant,
    ) {
        let (Some(events), Some(session_id)) = (&self.events, self.session_id) else {
            return;
        };

        let batch_count = batch_index + 1 + remaining.div_ceil(batch_size.max(1));
        events.emit_lossy(HarvestEvent::BatchCompleted {
            session_id,
            batch_index,
            batch_count,
            succeeded,
            attempted,
            timestamp: chrono::Utc::now(),
        });

        let elapsed = started.elapsed();
        let percentage = if total == 0 {
            100.0
        } else {
            (current as f32 / total as f32) * 100.0
        };
        events.emit_lossy(HarvestEvent::ProgressUpdated {
            session_id,
            current,
            total,
            percentage,
            elapsed_seconds: elapsed.as_secs(),
            estimated_remaining_seconds: estimate_remaining_seconds(elapsed, current, total),
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Linear-rate remaining-time estimate
///
/// `None` until at least one target has finished; saturates at zero once
/// everything is done.
pub fn estimate_remaining_seconds(elapsed: Duration, current: usize, total: usize) -> Option<u64> {
    if current == 0 {
        return None;
    }
    if current >= total {
        return Some(0);
    }
    let per_item = elapsed.as_secs_f64() / current as f64;
    Some((per_item * (total - current) as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn targets(n: usize) -> Vec<SearchTarget> {
        (0..n)
            .map(|i| SearchTarget::new(format!("facility-{i}")))
            .collect()
    }

    fn config(batch_size: usize, concurrency: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            concurrency,
            inter_batch_delay_ms: 0,
            failure_threshold: 0.5,
            shrink_after_failed_batches: 2,
            grow_after_successful_batches: 3,
            min_batch_size: 1,
        }
    }

    /// Collect the attempted-size sequence from BatchCompleted events
    fn batch_sizes(rx: &mut tokio::sync::broadcast::Receiver<HarvestEvent>) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let HarvestEvent::BatchCompleted { attempted, .. } = event {
                sizes.push(attempted);
            }
        }
        sizes
    }

    #[tokio::test]
    async fn test_partitions_into_ceil_batches() {
        let events = EventBus::new(64);
        let mut rx = events.subscribe();
        let scheduler =
            BatchScheduler::new(config(5, 1)).with_events(events, Uuid::new_v4());

        let report = scheduler
            .run(targets(11), &CancellationToken::new(), |_t| async {
                JobOutcome::success(())
            })
            .await;

        assert_eq!(report.attempted, 11);
        assert_eq!(report.succeeded, 11);
        assert_eq!(batch_sizes(&mut rx), vec![5, 5, 1]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let scheduler = BatchScheduler::new(config(6, 2));
        let report = scheduler
            .run(targets(6), &CancellationToken::new(), |_t| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    JobOutcome::success(())
                }
            })
            .await;

        assert_eq!(report.attempted, 6);
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "worker pool exceeded its bound: {}",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_repeated_failures_shrink_the_batch() {
        let events = EventBus::new(64);
        let mut rx = events.subscribe();
        let mut cfg = config(4, 2);
        cfg.shrink_after_failed_batches = 1;
        let scheduler = BatchScheduler::new(cfg).with_events(events, Uuid::new_v4());

        let report = scheduler
            .run(targets(8), &CancellationToken::new(), |_t| async {
                JobOutcome::failure(())
            })
            .await;

        // 4 fails -> halve to 2; 2 fails -> halve to 1; floor holds after
        assert_eq!(batch_sizes(&mut rx), vec![4, 2, 1, 1]);
        assert_eq!(report.attempted, 8);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.final_batch_size, 1);
    }

    #[tokio::test]
    async fn test_clean_batches_grow_back_to_the_cap() {
        let events = EventBus::new(64);
        let mut rx = events.subscribe();
        let mut cfg = config(4, 2);
        cfg.shrink_after_failed_batches = 1;
        cfg.grow_after_successful_batches = 1;
        let scheduler = BatchScheduler::new(cfg).with_events(events, Uuid::new_v4());

        let calls = Arc::new(AtomicUsize::new(0));
        let report = scheduler
            .run(targets(10), &CancellationToken::new(), |_t| {
                let calls = calls.clone();
                async move {
                    // First batch of four fails, everything after succeeds
                    if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                        JobOutcome::failure(())
                    } else {
                        JobOutcome::success(())
                    }
                }
            })
            .await;

        // Shrinks to 2, then one clean batch doubles it back to the cap
        assert_eq!(batch_sizes(&mut rx), vec![4, 2, 4]);
        assert_eq!(report.final_batch_size, 4);
    }

    #[tokio::test]
    async fn test_cancellation_returns_partial_results() {
        let cancel = CancellationToken::new();
        let scheduler = BatchScheduler::new(config(3, 1));

        let worker_cancel = cancel.clone();
        let report = scheduler
            .run(targets(9), &cancel, move |_t| {
                let cancel = worker_cancel.clone();
                async move {
                    // Cancel as soon as the first batch is underway
                    cancel.cancel();
                    JobOutcome::success(())
                }
            })
            .await;

        assert!(report.cancelled);
        assert!(report.attempted < 9);
        assert_eq!(report.results.len(), report.attempted);
    }

    #[tokio::test]
    async fn test_inter_batch_delay_is_applied() {
        let mut cfg = config(2, 2);
        cfg.inter_batch_delay_ms = 40;
        let scheduler = BatchScheduler::new(cfg);

        let start = Instant::now();
        scheduler
            .run(targets(4), &CancellationToken::new(), |_t| async {
                JobOutcome::success(())
            })
            .await;

        // One inter-batch pause between the two batches
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_remaining_time_estimate() {
        assert_eq!(
            estimate_remaining_seconds(Duration::from_secs(10), 10, 30),
            Some(20)
        );
        assert_eq!(estimate_remaining_seconds(Duration::from_secs(5), 0, 30), None);
        assert_eq!(
            estimate_remaining_seconds(Duration::from_secs(60), 30, 30),
            Some(0)
        );
    }

    #[test]
    fn test_results_preserve_input_order() {
        // Slot sorting puts out-of-order completions back in input order
        let mut items = vec![(2usize, JobOutcome::success("c")), (0, JobOutcome::success("a")), (1, JobOutcome::success("b"))];
        items.sort_by_key(|(slot, _)| *slot);
        let values: Vec<&str> = items.into_iter().map(|(_, j)| j.value).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }
}
