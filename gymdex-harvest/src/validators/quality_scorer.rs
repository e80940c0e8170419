//! Dataset quality scoring
//!
//! Scores a finished record set by field coverage. Each record earns
//! weight for the fields it carries; the dataset score is the average
//! over all records.

use gymdex_common::records::FacilityRecord;
use serde_json::{Value, json};

const NAME_WEIGHT: f32 = 0.20;
const ADDRESS_WEIGHT: f32 = 0.20;
const PHONE_WEIGHT: f32 = 0.15;
const COORDINATES_WEIGHT: f32 = 0.10;
const RATING_WEIGHT: f32 = 0.10;
const REVIEW_COUNT_WEIGHT: f32 = 0.10;
const CONFIDENCE_WEIGHT: f32 = 0.15;

/// Field-coverage scorer with pass/warning thresholds
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    pass_threshold: f32,
    warning_threshold: f32,
    confidence_floor: f32,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self {
            pass_threshold: 0.8,
            warning_threshold: 0.6,
            confidence_floor: 0.5,
        }
    }
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the pass/warning cut lines
    pub fn with_thresholds(pass_threshold: f32, warning_threshold: f32) -> Self {
        Self {
            pass_threshold,
            warning_threshold,
            ..Self::default()
        }
    }

    /// Average field-coverage score over the record set
    ///
    /// An empty set scores 0.0.
    pub fn score(&self, records: &[FacilityRecord]) -> f32 {
        if records.is_empty() {
            return 0.0;
        }
        let total: f32 = records.iter().map(|record| self.record_score(record)).sum();
        total / records.len() as f32
    }

    /// Weight earned by one record's populated fields
    pub fn record_score(&self, record: &FacilityRecord) -> f32 {
        let mut score = 0.0;
        if !record.name.trim().is_empty() {
            score += NAME_WEIGHT;
        }
        if !record.address.trim().is_empty() {
            score += ADDRESS_WEIGHT;
        }
        if record.phone.is_some() {
            score += PHONE_WEIGHT;
        }
        if record.latitude.is_some() && record.longitude.is_some() {
            score += COORDINATES_WEIGHT;
        }
        if record.rating.is_some() {
            score += RATING_WEIGHT;
        }
        if record.review_count.is_some() {
            score += REVIEW_COUNT_WEIGHT;
        }
        if record.confidence >= self.confidence_floor {
            score += CONFIDENCE_WEIGHT;
        }
        score
    }

    /// Status label for a dataset score
    pub fn status(&self, score: f32) -> &'static str {
        if score >= self.pass_threshold {
            "pass"
        } else if score >= self.warning_threshold {
            "warning"
        } else {
            "fail"
        }
    }

    /// JSON quality report with per-field coverage ratios
    pub fn report(&self, records: &[FacilityRecord]) -> Value {
        let count = records.len();
        let score = self.score(records);
        json!({
            "record_count": count,
            "quality_score": round3(score),
            "status": self.status(score),
            "field_coverage": {
                "name": round3(coverage(records, |r| !r.name.trim().is_empty())),
                "address": round3(coverage(records, |r| !r.address.trim().is_empty())),
                "phone": round3(coverage(records, |r| r.phone.is_some())),
                "coordinates": round3(coverage(records, |r| {
                    r.latitude.is_some() && r.longitude.is_some()
                })),
                "rating": round3(coverage(records, |r| r.rating.is_some())),
                "review_count": round3(coverage(records, |r| r.review_count.is_some())),
                "trusted_confidence": round3(coverage(records, |r| {
                    r.confidence >= self.confidence_floor
                })),
            },
        })
    }
}

fn coverage(records: &[FacilityRecord], present: impl Fn(&FacilityRecord) -> bool) -> f32 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|record| present(record)).count() as f32 / records.len() as f32
}

fn round3(value: f32) -> f64 {
    (f64::from(value) * 1000.0).round() / 1000.0
}
