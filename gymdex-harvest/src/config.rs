//! Harvest engine configuration
//!
//! All knobs have defaults tuned for the most failure-prone sources (small
//! batches, one in-flight request, generous delays). A `[harvest]` table in
//! `gymdex.toml` overrides fields individually.

use gymdex_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Retry policy around a single fetch operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
    /// Backoff growth factor per attempt
    pub multiplier: f64,
    /// Add 0-50% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 300,
            max_delay_ms: 5000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Adapter set and per-request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Query the keyed public dataset
    pub enable_public_data: bool,
    /// Query Naver search
    pub enable_naver: bool,
    /// Query Google search
    pub enable_google: bool,
    /// Query Daum search
    pub enable_daum: bool,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
    /// Minimum spacing between requests to one search engine, milliseconds
    pub min_request_interval_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enable_public_data: true,
            enable_naver: true,
            enable_google: true,
            enable_daum: true,
            request_timeout_secs: 10,
            min_request_interval_ms: 1200,
        }
    }
}

/// Per-target orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Stop querying further adapters once a result reaches this confidence
    pub early_termination_confidence: f32,
    /// Randomized delay between adapter calls, lower bound (ms)
    pub inter_adapter_delay_ms_min: u64,
    /// Randomized delay between adapter calls, upper bound (ms)
    pub inter_adapter_delay_ms_max: u64,
    /// Run all adapters concurrently instead of in priority order.
    /// Sequential is the default: it keeps the request pattern tame and the
    /// ban risk low.
    pub parallel_adapters: bool,
    /// Fixed cooldown after a block signal before moving to the next adapter (ms)
    pub blocked_cooldown_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            early_termination_confidence: 0.7,
            inter_adapter_delay_ms_min: 500,
            inter_adapter_delay_ms_max: 1500,
            parallel_adapters: false,
            blocked_cooldown_ms: 30_000,
        }
    }
}

/// Batch scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Targets per batch
    pub batch_size: usize,
    /// In-flight items per batch
    pub concurrency: usize,
    /// Sleep between batches, milliseconds
    pub inter_batch_delay_ms: u64,
    /// A batch fails when its success rate drops below this
    pub failure_threshold: f32,
    /// Halve the batch size after this many consecutive failed batches
    pub shrink_after_failed_batches: u32,
    /// Double the batch size after this many consecutive clean batches
    pub grow_after_successful_batches: u32,
    /// Lower bound when shrinking
    pub min_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            concurrency: 1,
            inter_batch_delay_ms: 2000,
            failure_threshold: 0.5,
            shrink_after_failed_batches: 2,
            grow_after_successful_batches: 3,
            min_batch_size: 1,
        }
    }
}

/// Matching and fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Similarity above which a baseline record and an observation are the
    /// same facility
    pub duplicate_threshold: f32,
    /// Name similarity weight
    pub name_weight: f32,
    /// Address similarity weight
    pub address_weight: f32,
    /// Phone match weight
    pub phone_weight: f32,
    /// Confidence floor applied to baselines carried through unmatched
    pub baseline_confidence_floor: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.8,
            name_weight: 0.45,
            address_weight: 0.30,
            phone_weight: 0.25,
            baseline_confidence_floor: 0.3,
        }
    }
}

/// Phase deadlines
///
/// An expired phase returns its best-effort partial result; deadlines never
/// propagate as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Ceiling for the bulk public-data collection phase, seconds
    pub bulk_collect_secs: u64,
    /// Ceiling for a single on-demand lookup, seconds
    pub single_lookup_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            bulk_collect_secs: 300,
            single_lookup_secs: 120,
        }
    }
}

/// Full harvest engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub adapters: AdapterConfig,
    pub retry: RetryPolicy,
    pub orchestrator: OrchestratorConfig,
    pub batch: BatchConfig,
    pub fusion: FusionConfig,
    pub deadlines: DeadlineConfig,
    /// Bounded observation cache capacity (entries)
    pub cache_capacity: usize,
}

/// `gymdex.toml` wrapper: the harvest table lives under `[harvest]`
#[derive(Debug, Default, Deserialize)]
struct HarvestFile {
    #[serde(default)]
    harvest: HarvestConfig,
}

impl HarvestConfig {
    /// Parse a full `gymdex.toml` document, taking the `[harvest]` table
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: HarvestFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse harvest config failed: {}", e)))?;
        let mut config = file.harvest;
        if config.cache_capacity == 0 {
            config.cache_capacity = Self::default_cache_capacity();
        }
        Ok(config)
    }

    /// Load from a config file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn default_cache_capacity() -> usize {
        128
    }

    /// Defaults with the cache capacity filled in
    pub fn with_defaults() -> Self {
        Self {
            cache_capacity: Self::default_cache_capacity(),
            ..Default::default()
        }
    }
}
