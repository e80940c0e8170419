//! Record and observation validation
//!
//! Rejects items too broken to use and normalizes the rest. Validation
//! failures skip the item and are counted; a bad row never aborts a run.

use gymdex_common::records::{FacilityRecord, Observation, clamp_confidence};
use tracing::debug;

/// Validates and normalizes crawl output before fusion
#[derive(Debug, Clone, Copy, Default)]
pub struct DataValidator;

impl DataValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check the fields an observation must carry
    pub fn validate_observation(&self, observation: &Observation) -> Result<(), String> {
        if observation.name.trim().is_empty() {
            return Err("missing name".to_string());
        }
        check_confidence(observation.confidence)
    }

    /// Check the fields a canonical record must carry
    pub fn validate_record(&self, record: &FacilityRecord) -> Result<(), String> {
        if record.name.trim().is_empty() {
            return Err("missing name".to_string());
        }
        if record.address.trim().is_empty() {
            return Err("missing address".to_string());
        }
        if record.source.trim().is_empty() {
            return Err("missing source".to_string());
        }
        check_confidence(record.confidence)
    }

    /// Trim text fields and pull numeric fields back into range
    pub fn normalize_observation(&self, observation: &mut Observation) {
        trim_in_place(&mut observation.name);
        trim_optional(&mut observation.address);
        trim_optional(&mut observation.phone);
        observation.rating = normalize_rating(observation.rating);
        observation.confidence = clamp_confidence(observation.confidence);
    }

    /// Trim text fields, drop out-of-range coordinates, clamp scores
    pub fn normalize_record(&self, record: &mut FacilityRecord) {
        trim_in_place(&mut record.name);
        trim_in_place(&mut record.address);
        trim_optional(&mut record.phone);
        record.rating = normalize_rating(record.rating);
        record.confidence = clamp_confidence(record.confidence);
        if record.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            record.latitude = None;
        }
        if record.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
            record.longitude = None;
        }
    }

    /// Validate and normalize a batch, returning survivors and a skip count
    pub fn filter_observations(&self, observations: Vec<Observation>) -> (Vec<Observation>, usize) {
        let mut kept = Vec::with_capacity(observations.len());
        let mut skipped = 0;
        for mut observation in observations {
            match self.validate_observation(&observation) {
                Ok(()) => {
                    self.normalize_observation(&mut observation);
                    kept.push(observation);
                }
                Err(reason) => {
                    debug!(
                        source = %observation.source,
                        reason = %reason,
                        "Skipping invalid observation"
                    );
                    skipped += 1;
                }
            }
        }
        (kept, skipped)
    }
}

fn check_confidence(confidence: f32) -> Result<(), String> {
    // NaN is forgiven (it clamps to zero later); out-of-range values are not
    let value = if confidence.is_nan() { 0.0 } else { confidence };
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("confidence {value} outside [0, 1]"))
    }
}

fn normalize_rating(rating: Option<f32>) -> Option<f32> {
    match rating {
        Some(value) if value.is_nan() => None,
        Some(value) => Some(value.clamp(0.0, 5.0)),
        None => None,
    }
}

fn trim_in_place(text: &mut String) {
    let trimmed = text.trim();
    if trimmed.len() != text.len() {
        *text = trimmed.to_string();
    }
}

fn trim_optional(slot: &mut Option<String>) {
    if let Some(text) = slot {
        trim_in_place(text);
        if text.is_empty() {
            *slot = None;
        }
    }
}
