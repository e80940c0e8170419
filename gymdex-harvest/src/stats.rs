//! Run statistics and error records
//!
//! Counters accumulated while a harvest runs, for the completion report
//! and for progress display. `RunStats` is shared with search workers;
//! everything else is plain data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary counters for one finished run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestStatistics {
    /// Targets put through the search phase
    pub total_processed: usize,
    /// Observations merged into a baseline record
    pub successfully_merged: usize,
    /// Targets that ended on a fallback result
    pub fallback_used: usize,
    /// Duplicate records dropped during fusion
    pub duplicates_removed: usize,
    /// Field-coverage score of the final record set
    pub quality_score: f32,
    /// Wall-clock duration of the run
    pub processing_time_ms: u64,
}

impl HarvestStatistics {
    pub fn display_string(&self) -> String {
        format!(
            "{} processed, {} merged, {} via fallback, {} duplicates removed, quality {:.2}, {} ms",
            self.total_processed,
            self.successfully_merged,
            self.fallback_used,
            self.duplicates_removed,
            self.quality_score,
            self.processing_time_ms
        )
    }
}

/// Outcome counters for one source adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceStats {
    /// Adapter name
    pub source: String,
    /// Queries issued
    pub attempts: u64,
    /// Queries that produced an observation
    pub hits: u64,
    /// Queries that came back empty
    pub misses: u64,
    /// Queries rejected as blocked
    pub blocked: u64,
    /// Queries that failed after the retry budget
    pub retries_exhausted: u64,
}

impl SourceStats {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{}: {} attempts, {} hits, {} misses, {} blocked, {} gave up",
            self.source, self.attempts, self.hits, self.misses, self.blocked, self.retries_exhausted
        )
    }

    /// Hits per attempt, 0.0 before any attempt
    pub fn hit_rate(&self) -> f32 {
        if self.attempts == 0 {
            0.0
        } else {
            self.hits as f32 / self.attempts as f32
        }
    }
}

#[derive(Debug, Default)]
struct RunTotals {
    targets_processed: usize,
    fallback_used: usize,
}

/// Thread-safe counters shared across search workers
///
/// Cloning shares the underlying counters.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    sources: Arc<Mutex<HashMap<String, SourceStats>>>,
    totals: Arc<Mutex<RunTotals>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A query was issued against this source
    pub fn record_attempt(&self, source: &str) {
        self.update(source, |stats| stats.attempts += 1);
    }

    /// The source returned an observation
    pub fn record_hit(&self, source: &str) {
        self.update(source, |stats| stats.hits += 1);
    }

    /// The source answered but had no result
    pub fn record_miss(&self, source: &str) {
        self.update(source, |stats| stats.misses += 1);
    }

    /// The source rejected the query as blocked
    pub fn record_block(&self, source: &str) {
        self.update(source, |stats| stats.blocked += 1);
    }

    /// The source kept failing until the retry budget ran out
    pub fn record_retries_exhausted(&self, source: &str) {
        self.update(source, |stats| stats.retries_exhausted += 1);
    }

    /// One target finished the search phase
    pub fn record_target(&self) {
        self.totals.lock().unwrap().targets_processed += 1;
    }

    /// One target ended on a fallback result
    pub fn record_fallback(&self) {
        self.totals.lock().unwrap().fallback_used += 1;
    }

    pub fn targets_processed(&self) -> usize {
        self.totals.lock().unwrap().targets_processed
    }

    pub fn fallback_used(&self) -> usize {
        self.totals.lock().unwrap().fallback_used
    }

    /// Snapshot of all per-source counters, name-sorted
    pub fn source_stats(&self) -> Vec<SourceStats> {
        let sources = self.sources.lock().unwrap();
        let mut all: Vec<SourceStats> = sources.values().cloned().collect();
        all.sort_by(|a, b| a.source.cmp(&b.source));
        all
    }

    fn update(&self, source: &str, apply: impl FnOnce(&mut SourceStats)) {
        let mut sources = self.sources.lock().unwrap();
        let stats = sources
            .entry(source.to_string())
            .or_insert_with(|| SourceStats::new(source));
        apply(stats);
    }
}

/// Severity of one recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Run continued with degraded output
    Warning,
    /// One item was dropped
    Skip,
    /// The run could not continue
    Critical,
}

/// One failure captured during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Facility the failure relates to, when known
    pub target: Option<String>,
    /// Stable machine-readable code
    pub error_code: String,
    /// Human-readable description
    pub error_message: String,
    /// How bad it was
    pub severity: ErrorSeverity,
    /// When it happened
    pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn warning(
        target: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(target, code, message, ErrorSeverity::Warning)
    }

    pub fn skip(
        target: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(target, code, message, ErrorSeverity::Skip)
    }

    pub fn critical(
        target: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(target, code, message, ErrorSeverity::Critical)
    }

    fn with_severity(
        target: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        severity: ErrorSeverity,
    ) -> Self {
        Self {
            target,
            error_code: code.into(),
            error_message: message.into(),
            severity,
            occurred_at: Utc::now(),
        }
    }
}
