//! Multi-source search orchestration
//!
//! For one target, walks the adapter registry in confidence order: retry
//! with backoff per source, cool down and move on when a source blocks,
//! stop early once a high-confidence observation is in hand, and merge
//! whatever was collected into a single observation. If nothing was
//! collected the fallback chain answers, so a target always resolves.

use crate::cache::ObservationCache;
use crate::config::{OrchestratorConfig, RetryPolicy};
use crate::fallback::FallbackChain;
use crate::retry::retry_fetch;
use crate::stats::RunStats;
use crate::types::{SearchTarget, SourceAdapter};
use futures::stream::{FuturesUnordered, StreamExt};
use gymdex_common::events::{EventBus, HarvestEvent};
use gymdex_common::records::Observation;
use rand::Rng;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of resolving one target across all sources
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The merged (or fallback) observation; always present
    pub observation: Observation,
    /// Sources actually queried
    pub sources_tried: u32,
    /// Sources that contributed an observation
    pub sources_hit: u32,
    /// Whether the fallback chain produced the observation
    pub used_fallback: bool,
    /// Sources that answered with a block signal
    pub blocked_sources: Vec<&'static str>,
}

pub struct SearchOrchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fallback: FallbackChain,
    cache: Arc<ObservationCache>,
    retry_policy: RetryPolicy,
    config: OrchestratorConfig,
    events: Option<EventBus>,
    session_id: Option<Uuid>,
    stats: Option<RunStats>,
}

impl SearchOrchestrator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        fallback: FallbackChain,
        cache: Arc<ObservationCache>,
        retry_policy: RetryPolicy,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            adapters,
            fallback,
            cache,
            retry_policy,
            config,
            events: None,
            session_id: None,
            stats: None,
        }
    }

    /// Attach an event bus; block signals are published to it
    pub fn with_events(mut self, events: EventBus, session_id: Uuid) -> Self {
        self.events = Some(events);
        self.session_id = Some(session_id);
        self
    }

    /// Attach shared run counters; every query outcome is recorded there
    pub fn with_stats(mut self, stats: RunStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Resolve one target across all sources
    ///
    /// Never fails: when every source is skipped, empty or broken, the
    /// fallback chain supplies the observation.
    pub async fn search_target(&self, target: &SearchTarget) -> SearchOutcome {
        let collected = if self.config.parallel_adapters {
            self.query_parallel(target).await
        } else {
            self.query_sequential(target).await
        };

        let (observation, used_fallback) = if collected.observations.is_empty() {
            debug!(target = %target.name, "No source produced data, entering fallback chain");
            (self.fallback.resolve(target).await, true)
        } else {
            let merged = merge_observations(collected.observations);
            (merged, false)
        };

        if observation.source != "fallback_stub" {
            self.cache
                .put(&target.name, target.address.as_deref(), observation.clone())
                .await;
        }

        SearchOutcome {
            observation,
            sources_tried: collected.tried,
            sources_hit: collected.hits,
            used_fallback,
            blocked_sources: collected.blocked,
        }
    }

    async fn query_sequential(&self, target: &SearchTarget) -> Collected {
        let mut collected = Collected::default();

        for adapter in &self.adapters {
            if !adapter.is_available() {
                debug!(
                    source = adapter.name(),
                    cooldown_ms = adapter
                        .cooldown_remaining()
                        .map(|d| d.as_millis() as u64)
                        .unwrap_or(0),
                    "Skipping unavailable source"
                );
                continue;
            }

            if collected.tried > 0 {
                self.inter_adapter_pause().await;
            }
            collected.tried += 1;

            let result =
                retry_fetch(adapter.name(), &self.retry_policy, || adapter.search(target)).await;
            self.absorb(adapter.as_ref(), target, result, &mut collected);

            if collected.best_confidence >= self.config.early_termination_confidence {
                debug!(
                    target = %target.name,
                    confidence = collected.best_confidence,
                    "Early termination, remaining sources skipped"
                );
                break;
            }
        }

        collected
    }

    /// Query every available source at once
    ///
    /// No early termination here: all requests are already in flight, so
    /// every answer gets merged.
    async fn query_parallel(&self, target: &SearchTarget) -> Collected {
        let mut collected = Collected::default();

        let mut futures = FuturesUnordered::new();
        for adapter in &self.adapters {
            if !adapter.is_available() {
                debug!(source = adapter.name(), "Skipping unavailable source");
                continue;
            }
            collected.tried += 1;

            let adapter = Arc::clone(adapter);
            let target = target.clone();
            let policy = self.retry_policy.clone();
            futures.push(async move {
                let result =
                    retry_fetch(adapter.name(), &policy, || adapter.search(&target)).await;
                (adapter, result)
            });
        }

        while let Some((adapter, result)) = futures.next().await {
            self.absorb(adapter.as_ref(), target, result, &mut collected);
        }
        collected
    }

    fn absorb(
        &self,
        adapter: &dyn SourceAdapter,
        target: &SearchTarget,
        result: Result<Option<Observation>, crate::types::FetchError>,
        collected: &mut Collected,
    ) {
        self.stat(|stats| stats.record_attempt(adapter.name()));
        match result {
            Ok(Some(obs)) => {
                debug!(
                    source = adapter.name(),
                    target = %target.name,
                    confidence = obs.confidence,
                    "Source produced an observation"
                );
                self.stat(|stats| stats.record_hit(adapter.name()));
                collected.hits += 1;
                collected.best_confidence = collected.best_confidence.max(obs.confidence);
                collected.observations.push(obs);
            }
            Ok(None) => {
                debug!(source = adapter.name(), target = %target.name, "Source had no data");
                self.stat(|stats| stats.record_miss(adapter.name()));
            }
            Err(e) if e.is_blocked() => {
                collected.blocked.push(adapter.name());
                self.stat(|stats| stats.record_block(adapter.name()));
                self.publish_block(adapter);
            }
            Err(e) => {
                warn!(
                    source = adapter.name(),
                    target = %target.name,
                    error = %e,
                    "Source failed for this target"
                );
                self.stat(|stats| stats.record_retries_exhausted(adapter.name()));
            }
        }
    }

    fn stat(&self, apply: impl FnOnce(&RunStats)) {
        if let Some(stats) = &self.stats {
            apply(stats);
        }
    }

    fn publish_block(&self, adapter: &dyn SourceAdapter) {
        let cooldown_ms = adapter
            .cooldown_remaining()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        info!(
            source = adapter.name(),
            cooldown_ms = cooldown_ms,
            "Source blocked; it sits out until the cooldown expires"
        );
        if let (Some(events), Some(session_id)) = (&self.events, self.session_id) {
            events.emit_lossy(HarvestEvent::SourceBlocked {
                session_id,
                source: adapter.name().to_string(),
                cooldown_ms,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Randomized pause between engine hits on the same target
    async fn inter_adapter_pause(&self) {
        let lo = self.config.inter_adapter_delay_ms_min;
        let hi = self.config.inter_adapter_delay_ms_max.max(lo);
        let pause_ms = rand::thread_rng().gen_range(lo..=hi);
        if pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        }
    }
}

#[derive(Default)]
struct Collected {
    observations: Vec<Observation>,
    tried: u32,
    hits: u32,
    best_confidence: f32,
    blocked: Vec<&'static str>,
}

/// Merge per-source observations into one
///
/// Highest confidence wins the base slot; lower-confidence sources fill
/// fields the base left empty. List fields take the union in first-seen
/// order. Provenance joins every contributing source, and the merged
/// confidence is the maximum of the inputs.
pub fn merge_observations(mut observations: Vec<Observation>) -> Observation {
    observations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let sources: Vec<String> = observations.iter().map(|o| o.source.clone()).collect();
    let mut iter = observations.into_iter();
    let mut merged = match iter.next() {
        Some(first) => first,
        None => return Observation::default(),
    };

    for obs in iter {
        fill_missing(&mut merged, obs);
    }

    merged.source = sources.join(" + ");
    merged
}

fn fill_missing(merged: &mut Observation, other: Observation) {
    if merged.address.is_none() {
        merged.address = other.address;
    }
    if merged.phone.is_none() {
        merged.phone = other.phone;
    }
    if merged.rating.is_none() {
        merged.rating = other.rating;
    }
    if merged.review_count.is_none() {
        merged.review_count = other.review_count;
    }
    if merged.open_hour.is_none() {
        merged.open_hour = other.open_hour;
    }
    if merged.close_hour.is_none() {
        merged.close_hour = other.close_hour;
    }
    if merged.monthly_fee.is_none() {
        merged.monthly_fee = other.monthly_fee;
    }
    if merged.day_pass_fee.is_none() {
        merged.day_pass_fee = other.day_pass_fee;
    }
    if merged.homepage.is_none() {
        merged.homepage = other.homepage;
    }
    if merged.instagram.is_none() {
        merged.instagram = other.instagram;
    }
    for item in other.facilities {
        if !merged.facilities.contains(&item) {
            merged.facilities.push(item);
        }
    }
    for item in other.services {
        if !merged.services.contains(&item) {
            merged.services.push(item);
        }
    }
}
