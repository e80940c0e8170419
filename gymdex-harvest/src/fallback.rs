//! Fallback strategies for failed lookups
//!
//! When every source for a target has failed or come back empty, the chain
//! tries each strategy in priority order. The chain always produces an
//! observation: the last resort is a minimal stub whose near-zero confidence
//! lets fusion treat it as "we know this place exists, nothing more".

use crate::cache::ObservationCache;
use crate::types::{SearchTarget, SourceAdapter};
use async_trait::async_trait;
use gymdex_common::records::Observation;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence of the last-resort stub observation
pub const STUB_CONFIDENCE: f32 = 0.05;
/// Name-only queries lose precision, so relaxed hits are marked down
const RELAXED_CONFIDENCE_PENALTY: f32 = 0.8;

/// One degraded way to answer a lookup that all sources failed
#[async_trait]
pub trait FallbackStrategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Execution order; lower runs first
    fn priority(&self) -> u8;

    fn is_available(&self) -> bool {
        true
    }

    /// Attempt to produce an observation; `None` passes to the next strategy
    async fn execute(&self, target: &SearchTarget) -> Option<Observation>;
}

/// Reuse a previously fetched observation for the same facility
pub struct CachedResultStrategy {
    cache: Arc<ObservationCache>,
}

impl CachedResultStrategy {
    pub fn new(cache: Arc<ObservationCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl FallbackStrategy for CachedResultStrategy {
    fn name(&self) -> &'static str {
        "cached_result"
    }

    fn priority(&self) -> u8 {
        1
    }

    async fn execute(&self, target: &SearchTarget) -> Option<Observation> {
        self.cache.get(&target.name, target.address.as_deref()).await
    }
}

/// Retry the least block-prone engine with a name-only query
///
/// Dropping the address widens the match and sometimes slips past result
/// pages that choked on the full query.
pub struct RelaxedQueryStrategy {
    adapter: Arc<dyn SourceAdapter>,
}

impl RelaxedQueryStrategy {
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl FallbackStrategy for RelaxedQueryStrategy {
    fn name(&self) -> &'static str {
        "relaxed_query"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn is_available(&self) -> bool {
        self.adapter.is_available()
    }

    async fn execute(&self, target: &SearchTarget) -> Option<Observation> {
        let relaxed = SearchTarget::new(target.name.clone());
        match self.adapter.search(&relaxed).await {
            Ok(Some(mut obs)) => {
                obs.confidence =
                    gymdex_common::records::clamp_confidence(obs.confidence * RELAXED_CONFIDENCE_PENALTY);
                Some(obs)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(
                    strategy = "relaxed_query",
                    adapter = self.adapter.name(),
                    error = %e,
                    "Relaxed query failed, passing to next strategy"
                );
                None
            }
        }
    }
}

/// Last resort: a name-and-address stub at near-zero confidence
pub struct MinimalStubStrategy;

impl MinimalStubStrategy {
    /// Stub observation for a target nothing could resolve
    pub fn stub(target: &SearchTarget) -> Observation {
        let mut obs = Observation::new(target.name.clone(), "fallback_stub", STUB_CONFIDENCE);
        obs.address = target.address.clone();
        obs
    }
}

#[async_trait]
impl FallbackStrategy for MinimalStubStrategy {
    fn name(&self) -> &'static str {
        "minimal_stub"
    }

    fn priority(&self) -> u8 {
        3
    }

    async fn execute(&self, target: &SearchTarget) -> Option<Observation> {
        Some(Self::stub(target))
    }
}

/// Priority-ordered fallback chain
///
/// [`FallbackChain::resolve`] always returns an observation. Even if every
/// registered strategy declines (or none are registered), the caller gets
/// the minimal stub.
pub struct FallbackChain {
    strategies: Vec<Arc<dyn FallbackStrategy>>,
}

impl FallbackChain {
    pub fn new(mut strategies: Vec<Arc<dyn FallbackStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.priority());
        Self { strategies }
    }

    /// Standard chain: cached result, relaxed query (when an engine is on
    /// hand), minimal stub
    pub fn standard(
        cache: Arc<ObservationCache>,
        relaxed_adapter: Option<Arc<dyn SourceAdapter>>,
    ) -> Self {
        let mut strategies: Vec<Arc<dyn FallbackStrategy>> = vec![
            Arc::new(CachedResultStrategy::new(cache)),
            Arc::new(MinimalStubStrategy),
        ];
        if let Some(adapter) = relaxed_adapter {
            strategies.push(Arc::new(RelaxedQueryStrategy::new(adapter)));
        }
        Self::new(strategies)
    }

    /// Strategy names in execution order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Produce the best degraded observation available
    pub async fn resolve(&self, target: &SearchTarget) -> Observation {
        for strategy in &self.strategies {
            if !strategy.is_available() {
                debug!(strategy = strategy.name(), "Fallback strategy unavailable, skipping");
                continue;
            }
            if let Some(obs) = strategy.execute(target).await {
                info!(
                    strategy = strategy.name(),
                    target = %target.name,
                    source = %obs.source,
                    confidence = obs.confidence,
                    "Fallback resolved the lookup"
                );
                return obs;
            }
        }

        warn!(target = %target.name, "Every fallback strategy declined, emitting stub");
        MinimalStubStrategy::stub(target)
    }
}
