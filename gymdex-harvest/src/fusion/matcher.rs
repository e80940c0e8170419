//! Baseline-to-observation matching
//!
//! Pairs crawled observations with the baseline records they describe.
//! Baselines are processed in order; each takes the highest-scoring
//! unconsumed observation at or above the duplicate threshold, with ties
//! going to the earlier observation. An observation is consumed by at
//! most one baseline.

use gymdex_common::records::{BaselineRecord, Observation};
use tracing::debug;

use crate::config::FusionConfig;
use crate::fusion::similarity::record_similarity;

/// One accepted baseline/observation pairing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPair {
    /// Index into the baseline slice
    pub baseline_index: usize,
    /// Index into the observation slice
    pub observation_index: usize,
    /// Similarity score that produced the pairing
    pub score: f32,
}

/// Result of one matching pass
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Accepted pairings, in baseline order
    pub pairs: Vec<MatchPair>,
    /// Baseline indices no observation matched
    pub unmatched_baselines: Vec<usize>,
    /// Observation indices no baseline consumed
    pub unmatched_observations: Vec<usize>,
}

/// Greedy fuzzy matcher over a similarity threshold
pub struct RecordMatcher {
    config: FusionConfig,
}

impl RecordMatcher {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Pair each baseline with its best unconsumed observation
    pub fn match_records(
        &self,
        baselines: &[BaselineRecord],
        observations: &[Observation],
    ) -> MatchOutcome {
        let mut consumed = vec![false; observations.len()];
        let mut outcome = MatchOutcome::default();

        for (baseline_index, baseline) in baselines.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            for (observation_index, observation) in observations.iter().enumerate() {
                if consumed[observation_index] {
                    continue;
                }
                let score = record_similarity(baseline, observation, &self.config);
                if score < self.config.duplicate_threshold {
                    continue;
                }
                // strict comparison keeps the earlier observation on ties
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((observation_index, score));
                }
            }

            match best {
                Some((observation_index, score)) => {
                    consumed[observation_index] = true;
                    outcome.pairs.push(MatchPair {
                        baseline_index,
                        observation_index,
                        score,
                    });
                }
                None => outcome.unmatched_baselines.push(baseline_index),
            }
        }

        outcome.unmatched_observations = (0..observations.len())
            .filter(|&index| !consumed[index])
            .collect();

        debug!(
            pairs = outcome.pairs.len(),
            unmatched_baselines = outcome.unmatched_baselines.len(),
            unmatched_observations = outcome.unmatched_observations.len(),
            "Record matching complete"
        );
        outcome
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
    fn test_matches_identical_pair() {
        let matcher = RecordMatcher::new(FusionConfig::default());
        let baselines = vec![baseline("파워 피트니스", "서울시 강남구 테헤란로 123")];
        let observations = vec![
            observation("파워 피트니스", Some("서울시 강남구 테헤란로 123")),
            observation("요가 스튜디오", Some("부산시 해운대구 중동2로 5")),
        ];

        let outcome = matcher.match_records(&baselines, &observations);

        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].baseline_index, 0);
        assert_eq!(outcome.pairs[0].observation_index, 0);
        assert!(outcome.pairs[0].score >= 0.8);
        assert!(outcome.unmatched_baselines.is_empty());
        assert_eq!(outcome.unmatched_observations, vec![1]);
    }

    #[test]
    fn test_below_threshold_stays_unmatched() {
        let matcher = RecordMatcher::new(FusionConfig::default());
        let baselines = vec![baseline("파워 피트니스", "서울시 강남구 테헤란로 123")];
        let observations = vec![observation("스피닝 클럽", Some("인천시 연수구 송도로 9"))];

        let outcome = matcher.match_records(&baselines, &observations);

        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_baselines, vec![0]);
        assert_eq!(outcome.unmatched_observations, vec![0]);
    }

    #[test]
    fn test_observation_consumed_at_most_once() {
        let matcher = RecordMatcher::new(FusionConfig::default());
        // Two baselines could both match the single observation
        let baselines = vec![
            baseline("파워 피트니스", "서울시 강남구 테헤란로 123"),
            baseline("파워 피트니스", "서울시 강남구 테헤란로 125"),
        ];
        let observations = vec![observation("파워 피트니스", None)];

        let outcome = matcher.match_records(&baselines, &observations);

        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].baseline_index, 0);
        assert_eq!(outcome.unmatched_baselines, vec![1]);
        assert!(outcome.unmatched_observations.is_empty());
    }

    #[test]
    fn test_tie_goes_to_earlier_observation() {
        let matcher = RecordMatcher::new(FusionConfig::default());
        let baselines = vec![baseline("파워 피트니스", "서울시 강남구 테헤란로 123")];
        let observations = vec![
            observation("파워 피트니스", None),
            observation("파워 피트니스", None),
        ];

        let outcome = matcher.match_records(&baselines, &observations);

        assert_eq!(outcome.pairs[0].observation_index, 0);
        assert_eq!(outcome.unmatched_observations, vec![1]);
    }

    #[test]
    fn test_empty_inputs() {
        let matcher = RecordMatcher::new(FusionConfig::default());

        let outcome = matcher.match_records(&[], &[observation("파워 피트니스", None)]);
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_observations, vec![0]);

        let outcome = matcher.match_records(&[baseline("파워 피트니스", "서울시 강남구 테헤란로 123")], &[]);
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_baselines, vec![0]);
    }
}
