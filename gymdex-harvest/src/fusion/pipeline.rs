//! Fusion pipeline
//!
//! Drives one fusion pass: validate observations, match them against the
//! baselines, merge matched pairs, carry unmatched baselines through,
//! promote unmatched observations to new records, deduplicate, and score
//! the result.

use std::collections::HashSet;

use gymdex_common::records::{BaselineRecord, Conflict, FacilityRecord, Observation};
use tracing::{debug, info};

use crate::config::FusionConfig;
use crate::fusion::fuser::RecordFuser;
use crate::fusion::matcher::RecordMatcher;
use crate::validators::{DataValidator, QualityScorer};

/// What one fusion pass produced
#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    /// Final canonical records, deduplicated
    pub records: Vec<FacilityRecord>,
    /// Field disagreements observed while merging
    pub conflicts: Vec<Conflict>,
    /// Baselines merged with an observation
    pub merged: usize,
    /// New records promoted from unmatched observations
    pub inserted: usize,
    /// Baselines carried through unmatched
    pub carried: usize,
    /// Records dropped as same-facility duplicates
    pub duplicates_removed: usize,
    /// Observations and candidate records dropped by validation
    pub invalid_dropped: usize,
    /// Field-coverage score of the final record set
    pub quality_score: f32,
}

/// Match, fuse, deduplicate, and score in one pass
pub struct FusionPipeline {
    matcher: RecordMatcher,
    fuser: RecordFuser,
    validator: DataValidator,
    scorer: QualityScorer,
}

impl FusionPipeline {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            matcher: RecordMatcher::new(config.clone()),
            fuser: RecordFuser::new(config),
            validator: DataValidator::new(),
            scorer: QualityScorer::new(),
        }
    }

    /// Fuse a set of observations into the baseline records
    pub fn run(
        &self,
        baselines: &[BaselineRecord],
        observations: Vec<Observation>,
    ) -> FusionOutcome {
        let (observations, mut invalid_dropped) = self.validator.filter_observations(observations);
        let matches = self.matcher.match_records(baselines, &observations);

        let mut conflicts = Vec::new();
        let mut records = Vec::with_capacity(baselines.len() + matches.unmatched_observations.len());

        for pair in &matches.pairs {
            records.push(self.fuser.fuse(
                &baselines[pair.baseline_index],
                &observations[pair.observation_index],
                &mut conflicts,
            ));
        }
        let merged = matches.pairs.len();

        for &index in &matches.unmatched_baselines {
            records.push(self.fuser.carry_baseline(&baselines[index]));
        }
        let carried = matches.unmatched_baselines.len();

        let mut inserted = 0;
        for &index in &matches.unmatched_observations {
            let mut candidate = self.fuser.record_from_observation(&observations[index]);
            match self.validator.validate_record(&candidate) {
                Ok(()) => {
                    self.validator.normalize_record(&mut candidate);
                    records.push(candidate);
                    inserted += 1;
                }
                Err(reason) => {
                    debug!(
                        name = %observations[index].name,
                        source = %observations[index].source,
                        reason = %reason,
                        "Discarding observation that cannot stand alone"
                    );
                    invalid_dropped += 1;
                }
            }
        }

        for record in &mut records {
            self.validator.normalize_record(record);
        }

        let before = records.len();
        let mut seen = HashSet::new();
        records.retain(|record| seen.insert(record.normalized_key()));
        let duplicates_removed = before - records.len();

        let quality_score = self.scorer.score(&records);
        info!(
            records = records.len(),
            merged,
            carried,
            inserted,
            duplicates_removed,
            invalid_dropped,
            conflicts = conflicts.len(),
            quality_score,
            "Fusion pass complete"
        );

        FusionOutcome {
            records,
            conflicts,
            merged,
            inserted,
            carried,
            duplicates_removed,
            invalid_dropped,
            quality_score,
        }
    }

    /// Quality report for an already-fused record set
    pub fn quality_report(&self, records: &[FacilityRecord]) -> serde_json::Value {
        self.scorer.report(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(name: &str, address: &str) -> BaselineRecord {
        BaselineRecord::new(name, address, "public_data", 0.9)
    }

    fn observation(name: &str, address: Option<&str>) -> Observation {
        let mut obs = Observation::new(name, "naver", 0.75);
        obs.address = address.map(str::to_string);
        obs
    }

    #[test]
    fn test_full_pass_counts() {
        let pipeline = FusionPipeline::new(FusionConfig::default());
        let baselines = vec![
            baseline("파워 피트니스", "서울시 강남구 테헤란로 123"),
            baseline("바디 짐", "서울시 마포구 월드컵로 77"),
        ];
        let mut matching = observation("파워 피트니스", Some("서울시 강남구 테헤란로 123"));
        matching.phone = Some("02-1234-5678".to_string());
        matching.rating = Some(4.5);
        let unrelated = observation("요가 스튜디오", Some("부산시 해운대구 중동2로 5"));

        let outcome = pipeline.run(&baselines, vec![matching, unrelated]);

        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.carried, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.duplicates_removed, 0);
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.conflicts.is_empty());
        assert!(outcome.quality_score > 0.0);

        let fused = outcome
            .records
            .iter()
            .find(|record| record.name == "파워 피트니스")
            .unwrap();
        assert_eq!(fused.phone.as_deref(), Some("02-1234-5678"));
        assert_eq!(fused.source, "public_data + naver");
    }

    #[test]
    fn test_duplicate_baselines_are_collapsed() {
        let pipeline = FusionPipeline::new(FusionConfig::default());
        let baselines = vec![
            baseline("파워 피트니스", "서울시 강남구 테헤란로 123"),
            baseline("파워 피트니스", "서울시 강남구 테헤란로 123"),
        ];

        let outcome = pipeline.run(&baselines, Vec::new());

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.carried, 2);
    }

    #[test]
    fn test_invalid_observations_are_counted_not_fatal() {
        let pipeline = FusionPipeline::new(FusionConfig::default());
        let baselines = vec![baseline("파워 피트니스", "서울시 강남구 테헤란로 123")];
        let observations = vec![
            observation("", Some("서울시 어딘가")),
            // no address, cannot stand alone as a new record
            observation("주소 없는 헬스장", None),
        ];

        let outcome = pipeline.run(&baselines, observations);

        assert_eq!(outcome.invalid_dropped, 2);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_conflicts_surface_in_outcome() {
        let pipeline = FusionPipeline::new(FusionConfig::default());
        let mut base = baseline("파워 피트니스", "서울시 강남구 테헤란로 123");
        base.phone = Some("02-1111-2222".to_string());
        let mut obs = observation("파워 피트니스", Some("서울시 강남구 테헤란로 123"));
        obs.phone = Some("02-3333-4444".to_string());

        let outcome = pipeline.run(&[base], vec![obs]);

        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].field, "phone");
        let record = &outcome.records[0];
        assert_eq!(record.phone.as_deref(), Some("02-1111-2222"));
    }

    #[test]
    fn test_empty_inputs_produce_empty_outcome() {
        let pipeline = FusionPipeline::new(FusionConfig::default());
        let outcome = pipeline.run(&[], Vec::new());

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.quality_score, 0.0);
    }
}
