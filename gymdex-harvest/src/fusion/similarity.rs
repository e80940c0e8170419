//! Field-level similarity scoring
//!
//! Compares a baseline record against a crawled observation field by field
//! and blends the per-field scores into one [0.0, 1.0] value. Text fields
//! are normalized before comparison so formatting differences ("ABC Gym"
//! vs "ABC GYM!") do not depress the score.

use gymdex_common::records::{BaselineRecord, Observation};
use strsim::normalized_levenshtein;

use crate::config::FusionConfig;

/// Lowercase a string and strip everything that is not a letter or digit
///
/// Works for Korean text as well: Hangul syllables are letters, so only
/// punctuation, whitespace, and symbols are dropped.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Keep only the ASCII digits of a phone number
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Normalized Levenshtein ratio over normalized forms
///
/// 1.0 for identical strings, 0.0 for completely different ones. Two
/// strings that normalize to the same form score 1.0 regardless of case,
/// spacing, or punctuation.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize(a), &normalize(b))
}

/// Phone match score over digits-only forms
///
/// Exact digit match scores 1.0. A substring match scores 0.9 and covers
/// numbers listed with and without an area code. Anything else is 0.0.
pub fn phone_similarity(a: &str, b: &str) -> f64 {
    digit_similarity(&phone_digits(a), &phone_digits(b))
}

fn digit_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        0.0
    } else if a == b {
        1.0
    } else if a.contains(b) || b.contains(a) {
        0.9
    } else {
        0.0
    }
}

/// Weighted similarity between a baseline record and an observation
///
/// Name always participates. Address and phone participate only when both
/// sides carry a value; their weights are redistributed over the fields
/// actually compared, so a name-only observation can still reach 1.0.
pub fn record_similarity(
    baseline: &BaselineRecord,
    observation: &Observation,
    config: &FusionConfig,
) -> f32 {
    let mut weighted = f64::from(config.name_weight) * text_similarity(&baseline.name, &observation.name);
    let mut weight_sum = f64::from(config.name_weight);

    if let Some(address) = observation.address.as_deref() {
        weighted += f64::from(config.address_weight) * text_similarity(&baseline.address, address);
        weight_sum += f64::from(config.address_weight);
    }

    if let (Some(baseline_phone), Some(observed_phone)) =
        (baseline.phone.as_deref(), observation.phone.as_deref())
    {
        let baseline_digits = phone_digits(baseline_phone);
        let observed_digits = phone_digits(observed_phone);
        if !baseline_digits.is_empty() && !observed_digits.is_empty() {
            weighted += f64::from(config.phone_weight) * digit_similarity(&baseline_digits, &observed_digits);
            weight_sum += f64::from(config.phone_weight);
        }
    }

    if weight_sum <= f64::EPSILON {
        return 0.0;
    }
    (weighted / weight_sum) as f32
}
