//! Harvest service
//!
//! Top-level engine behind one facility harvest. A run walks five steps:
//! read the stored record set, bulk-collect the public dataset, search
//! the web sources target by target, fuse everything into canonical
//! records, write the result back. Every step degrades rather than
//! aborts; only a second concurrent `run` or a store failure is an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use gymdex_common::events::{EventBus, HarvestEvent};
use gymdex_common::records::{BaselineRecord, Conflict, FacilityRecord};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{self, PublicDataAdapter};
use crate::cache::ObservationCache;
use crate::config::HarvestConfig;
use crate::error::ServiceError;
use crate::fallback::{FallbackChain, MinimalStubStrategy};
use crate::fusion::FusionPipeline;
use crate::orchestrator::SearchOrchestrator;
use crate::scheduler::{BatchScheduler, JobOutcome};
use crate::session::{HarvestSession, SessionState};
use crate::stats::{ErrorRecord, ErrorSeverity, HarvestStatistics, RunStats, SourceStats};
use crate::store::RecordStore;
use crate::types::{SearchTarget, SourceAdapter};
use crate::validators::DataValidator;

/// Everything a finished run reports
#[derive(Debug, Clone)]
pub struct HarvestReport {
    /// Final canonical record set, as written to the store
    pub records: Vec<FacilityRecord>,
    /// Run summary counters
    pub statistics: HarvestStatistics,
    /// Per-source outcome counters
    pub source_stats: Vec<SourceStats>,
    /// Failures the run survived
    pub errors: Vec<ErrorRecord>,
    /// Field disagreements observed while merging
    pub conflicts: Vec<Conflict>,
}

impl HarvestReport {
    pub fn count_by_severity(&self, severity: ErrorSeverity) -> usize {
        self.errors
            .iter()
            .filter(|error| error.severity == severity)
            .count()
    }
}

/// The harvest engine
///
/// Owns the adapter registry, the observation cache, and the event bus.
/// One instance serves many runs, but never two at once.
pub struct HarvestService {
    config: HarvestConfig,
    store: Arc<dyn RecordStore>,
    events: EventBus,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    public_data: Option<Arc<PublicDataAdapter>>,
    cache: Arc<ObservationCache>,
    running: AtomicBool,
    cancel: StdMutex<CancellationToken>,
}

impl HarvestService {
    /// Build a service with the standard adapter registry
    pub fn new(
        config: HarvestConfig,
        store: Arc<dyn RecordStore>,
        data_api_key: Option<String>,
    ) -> Self {
        let set = adapters::build_adapter_set(&config, data_api_key);
        Self::assemble(config, store, set.adapters, set.public_data)
    }

    /// Build a service over caller-supplied adapters
    ///
    /// Bulk dataset collection is skipped; the baseline comes from the
    /// store alone.
    pub fn with_adapters(
        config: HarvestConfig,
        store: Arc<dyn RecordStore>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        Self::assemble(config, store, adapters, None)
    }

    fn assemble(
        config: HarvestConfig,
        store: Arc<dyn RecordStore>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        public_data: Option<Arc<PublicDataAdapter>>,
    ) -> Self {
        let cache = Arc::new(ObservationCache::new(config.cache_capacity));
        Self {
            config,
            store,
            events: EventBus::new(256),
            adapters,
            public_data,
            cache,
            running: AtomicBool::new(false),
            cancel: StdMutex::new(CancellationToken::new()),
        }
    }

    /// The bus run lifecycle events are published on
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Request cancellation of the active run
    ///
    /// Takes effect at the next batch or item boundary. A no-op when
    /// nothing is running.
    pub fn cancel(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Execute one full harvest
    pub async fn run(&self) -> Result<HarvestReport, ServiceError> {
        let _slot = self.acquire_run_slot()?;
        let cancel = self.fresh_cancel_token();
        let started = Instant::now();
        let mut session = HarvestSession::new();
        let stats = RunStats::new();
        let mut errors: Vec<ErrorRecord> = Vec::new();

        info!(session_id = %session.id, "Harvest run starting");
        session.transition_to(SessionState::CollectingBaseline);

        let stored = match self.store.read().await {
            Ok(records) => records,
            Err(e) => return Err(self.fail(&mut session, e.into())),
        };
        let baselines = self.assemble_baseline(stored, &mut errors).await;
        info!(targets = baselines.len(), "Baseline assembled");

        self.events.emit_lossy(HarvestEvent::HarvestStarted {
            session_id: session.id,
            total_targets: baselines.len(),
            timestamp: Utc::now(),
        });

        session.transition_to(SessionState::Searching);
        self.events.emit_lossy(HarvestEvent::PhaseStarted {
            session_id: session.id,
            phase: "searching".to_string(),
            timestamp: Utc::now(),
        });

        let targets: Vec<SearchTarget> = baselines
            .iter()
            .map(|b| SearchTarget::with_address(b.name.clone(), b.address.clone()))
            .collect();
        let total_targets = targets.len();

        let orchestrator = Arc::new(
            self.build_orchestrator()
                .with_events(self.events.clone(), session.id)
                .with_stats(stats.clone()),
        );
        let scheduler = BatchScheduler::new(self.config.batch.clone())
            .with_events(self.events.clone(), session.id);

        let batch_report = scheduler
            .run(targets, &cancel, |target| {
                let orchestrator = Arc::clone(&orchestrator);
                let stats = stats.clone();
                async move {
                    let outcome = orchestrator.search_target(&target).await;
                    stats.record_target();
                    if outcome.used_fallback {
                        stats.record_fallback();
                        JobOutcome::failure(outcome.observation)
                    } else {
                        JobOutcome::success(outcome.observation)
                    }
                }
            })
            .await;

        session.update_progress(batch_report.attempted, total_targets);

        if batch_report.cancelled {
            warn!(
                session_id = %session.id,
                attempted = batch_report.attempted,
                "Harvest cancelled mid-search"
            );
            session.transition_to(SessionState::Cancelled);
            self.events.emit_lossy(HarvestEvent::HarvestCancelled {
                session_id: session.id,
                targets_processed: batch_report.attempted,
                timestamp: Utc::now(),
            });
            return Err(ServiceError::Cancelled(format!(
                "stopped after {} of {} targets",
                batch_report.attempted, total_targets
            )));
        }

        session.transition_to(SessionState::Fusing);
        self.events.emit_lossy(HarvestEvent::PhaseStarted {
            session_id: session.id,
            phase: "fusing".to_string(),
            timestamp: Utc::now(),
        });

        let pipeline = FusionPipeline::new(self.config.fusion.clone());
        let fusion = pipeline.run(&baselines, batch_report.results);
        if fusion.invalid_dropped > 0 {
            errors.push(ErrorRecord::skip(
                None,
                "validation_failed",
                format!("{} items dropped by validation", fusion.invalid_dropped),
            ));
        }

        if let Err(e) = self.store.write(&fusion.records).await {
            return Err(self.fail(&mut session, e.into()));
        }

        let statistics = HarvestStatistics {
            total_processed: stats.targets_processed(),
            successfully_merged: fusion.merged,
            fallback_used: stats.fallback_used(),
            duplicates_removed: fusion.duplicates_removed,
            quality_score: fusion.quality_score,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        session.transition_to(SessionState::Completed);
        self.events.emit_lossy(HarvestEvent::HarvestCompleted {
            session_id: session.id,
            total_records: fusion.records.len(),
            merged: fusion.merged,
            quality_score: fusion.quality_score,
            duration_seconds: started.elapsed().as_secs(),
            timestamp: Utc::now(),
        });
        info!(
            session_id = %session.id,
            summary = %statistics.display_string(),
            "Harvest complete"
        );

        Ok(HarvestReport {
            records: fusion.records,
            statistics,
            source_stats: stats.source_stats(),
            errors,
            conflicts: fusion.conflicts,
        })
    }

    /// Resolve a single facility on demand
    ///
    /// Queries the live sources only; the store is neither read nor
    /// written. When the deadline expires the stub answer is returned.
    pub async fn lookup(
        &self,
        name: &str,
        address: Option<&str>,
    ) -> Result<FacilityRecord, ServiceError> {
        let target = match address {
            Some(address) => SearchTarget::with_address(name, address),
            None => SearchTarget::new(name),
        };

        let deadline = Duration::from_secs(self.config.deadlines.single_lookup_secs);
        let orchestrator = self.build_orchestrator();
        let observation = match timeout(deadline, orchestrator.search_target(&target)).await {
            Ok(outcome) => outcome.observation,
            Err(_) => {
                warn!(
                    target = name,
                    deadline_secs = self.config.deadlines.single_lookup_secs,
                    "Lookup deadline expired, answering with the stub"
                );
                MinimalStubStrategy::stub(&target)
            }
        };

        let fuser = crate::fusion::RecordFuser::new(self.config.fusion.clone());
        let mut record = fuser.record_from_observation(&observation);
        DataValidator::new().normalize_record(&mut record);
        Ok(record)
    }

    /// Merge the stored records with a fresh public dataset snapshot
    ///
    /// Stored records come first and win key collisions. Dataset failures
    /// and deadline expiry degrade to whatever was already assembled.
    async fn assemble_baseline(
        &self,
        stored: Vec<FacilityRecord>,
        errors: &mut Vec<ErrorRecord>,
    ) -> Vec<BaselineRecord> {
        let mut keys: HashSet<String> = HashSet::new();
        let mut baselines: Vec<BaselineRecord> = Vec::with_capacity(stored.len());
        for record in &stored {
            let baseline = BaselineRecord::from_record(record);
            if keys.insert(baseline.normalized_key()) {
                baselines.push(baseline);
            }
        }

        let Some(public_data) = &self.public_data else {
            debug!("No public-data adapter, baseline comes from the store alone");
            return baselines;
        };

        let deadline_secs = self.config.deadlines.bulk_collect_secs;
        match timeout(Duration::from_secs(deadline_secs), public_data.collect_all()).await {
            Ok(Ok(rows)) => {
                let mut added = 0usize;
                for row in rows {
                    if keys.insert(row.normalized_key()) {
                        baselines.push(row);
                        added += 1;
                    }
                }
                info!(added, total = baselines.len(), "Public dataset merged into baseline");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Public dataset collection failed, continuing without it");
                errors.push(ErrorRecord::warning(
                    None,
                    "public_data_failed",
                    e.to_string(),
                ));
            }
            Err(_) => {
                warn!(
                    deadline_secs,
                    "Public dataset collection timed out, continuing with what the store had"
                );
                errors.push(ErrorRecord::warning(
                    None,
                    "phase_timeout",
                    format!("public dataset collection exceeded {deadline_secs}s"),
                ));
            }
        }
        baselines
    }

    fn build_orchestrator(&self) -> SearchOrchestrator {
        let relaxed_engine = self
            .adapters
            .iter()
            .find(|adapter| adapter.name() != "public_data")
            .cloned();
        let fallback = FallbackChain::standard(Arc::clone(&self.cache), relaxed_engine);
        SearchOrchestrator::new(
            self.adapters.clone(),
            fallback,
            Arc::clone(&self.cache),
            self.config.retry.clone(),
            self.config.orchestrator.clone(),
        )
    }

    fn acquire_run_slot(&self) -> Result<RunSlot<'_>, ServiceError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServiceError::AlreadyRunning(
                "a harvest session is active".to_string(),
            ));
        }
        Ok(RunSlot {
            flag: &self.running,
        })
    }

    fn fresh_cancel_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();
        token
    }

    fn fail(&self, session: &mut HarvestSession, error: ServiceError) -> ServiceError {
        let message = error.to_string();
        warn!(session_id = %session.id, error = %message, "Harvest run failed");
        session.error_message = Some(message.clone());
        session.transition_to(SessionState::Failed);
        self.events.emit_lossy(HarvestEvent::HarvestFailed {
            session_id: session.id,
            error_message: message,
            timestamp: Utc::now(),
        });
        error
    }
}

/// Clears the running flag when a run ends, however it ends
struct RunSlot<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
