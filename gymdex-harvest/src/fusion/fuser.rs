//! Field-wise record fusion
//!
//! Merges a matched observation into its baseline record. The baseline is
//! authoritative for identity fields (name, address) and wins every scalar
//! conflict; observation values fill fields the baseline does not carry.
//! Disagreements between two non-empty values are logged as conflicts but
//! never block the merge.

use chrono::Utc;
use gymdex_common::records::{
    BaselineRecord, Conflict, FacilityKind, FacilityRecord, Observation, clamp_confidence,
};
use tracing::debug;

use crate::config::FusionConfig;
use crate::fusion::similarity::{normalize, phone_digits};

/// Merges observations into baselines and builds records for the leftovers
pub struct RecordFuser {
    config: FusionConfig,
}

impl RecordFuser {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Merge one observation into its matched baseline
    ///
    /// Scalar fields keep the baseline value when present and adopt the
    /// observation's otherwise. Keyword lists are unioned. The source list
    /// is the union of both sides and the confidence is the higher of the
    /// two. Field disagreements append to `conflicts`.
    pub fn fuse(
        &self,
        baseline: &BaselineRecord,
        observation: &Observation,
        conflicts: &mut Vec<Conflict>,
    ) -> FacilityRecord {
        let mut record = FacilityRecord::from_baseline(baseline);
        let key = record.normalized_key();
        let before = conflicts.len();

        if normalize(&observation.name) != normalize(&record.name) {
            conflicts.push(Conflict::kept_baseline(
                &key,
                "name",
                &record.name,
                &observation.name,
            ));
        }

        if let Some(observed_address) = observation.address.as_deref() {
            if normalize(observed_address) != normalize(&record.address) {
                conflicts.push(Conflict::kept_baseline(
                    &key,
                    "address",
                    &record.address,
                    observed_address,
                ));
            }
        }

        match (record.phone.as_deref(), observation.phone.as_deref()) {
            (Some(kept), Some(observed)) if phone_digits(kept) != phone_digits(observed) => {
                conflicts.push(Conflict::kept_baseline(&key, "phone", kept, observed));
            }
            (None, Some(observed)) => record.phone = Some(observed.to_string()),
            _ => {}
        }

        record.rating = record.rating.or(observation.rating);
        record.review_count = record.review_count.or(observation.review_count);
        record.monthly_fee = record.monthly_fee.or(observation.monthly_fee);
        record.day_pass_fee = record.day_pass_fee.or(observation.day_pass_fee);
        adopt_text(&mut record.open_hour, &observation.open_hour);
        adopt_text(&mut record.close_hour, &observation.close_hour);
        adopt_text(&mut record.homepage, &observation.homepage);
        adopt_text(&mut record.instagram, &observation.instagram);

        union_into(&mut record.facilities, &observation.facilities);
        union_into(&mut record.services, &observation.services);
        derive_flags(&mut record);

        if observation.kind == FacilityKind::Public {
            record.kind = FacilityKind::Public;
        }
        record.source = union_sources(&record.source, &observation.source);
        record.confidence = record
            .confidence
            .max(clamp_confidence(observation.confidence));
        record.updated_at = Utc::now();
        record.crawled_at = Some(Utc::now());

        debug!(
            key = %key,
            source = %record.source,
            conflicts = conflicts.len() - before,
            "Fused observation into baseline"
        );
        record
    }

    /// Carry an unmatched baseline through as-is
    ///
    /// The confidence is floored so stale registry rows stay visible, and
    /// an empty source is labeled "baseline".
    pub fn carry_baseline(&self, baseline: &BaselineRecord) -> FacilityRecord {
        let mut record = FacilityRecord::from_baseline(baseline);
        record.confidence = record.confidence.max(self.config.baseline_confidence_floor);
        if record.source.trim().is_empty() {
            record.source = "baseline".to_string();
        }
        record.updated_at = Utc::now();
        record
    }

    /// Build a brand-new record from an observation no baseline claimed
    pub fn record_from_observation(&self, observation: &Observation) -> FacilityRecord {
        let mut record = FacilityRecord {
            name: observation.name.clone(),
            address: observation.address.clone().unwrap_or_default(),
            phone: observation.phone.clone(),
            rating: observation.rating,
            review_count: observation.review_count,
            open_hour: observation.open_hour.clone(),
            close_hour: observation.close_hour.clone(),
            monthly_fee: observation.monthly_fee,
            day_pass_fee: observation.day_pass_fee,
            facilities: observation.facilities.clone(),
            services: observation.services.clone(),
            homepage: observation.homepage.clone(),
            instagram: observation.instagram.clone(),
            has_gx: None,
            has_pt: None,
            is_24h: None,
            has_parking: None,
            has_shower: None,
            business_status: None,
            category: None,
            latitude: None,
            longitude: None,
            source: observation.source.clone(),
            confidence: clamp_confidence(observation.confidence),
            kind: observation.kind,
            updated_at: Utc::now(),
            crawled_at: Some(Utc::now()),
        };
        derive_flags(&mut record);
        record
    }
}

fn adopt_text(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

fn union_into(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.iter().any(|existing| existing == item) {
            into.push(item.clone());
        }
    }
}

fn union_sources(a: &str, b: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in a.split(" + ").chain(b.split(" + ")) {
        let part = part.trim();
        if !part.is_empty() && !parts.contains(&part) {
            parts.push(part);
        }
    }
    parts.join(" + ")
}

/// Fill the boolean flags that follow from keyword lists and hours
///
/// Flags stay None when nothing supports them: a missing keyword means
/// unknown, not absent.
fn derive_flags(record: &mut FacilityRecord) {
    if record.services.iter().any(|s| s == "GX") {
        record.has_gx = Some(true);
    }
    if record.services.iter().any(|s| s == "PT") {
        record.has_pt = Some(true);
    }
    if record.facilities.iter().any(|f| f == "주차장") {
        record.has_parking = Some(true);
    }
    if record.facilities.iter().any(|f| f == "샤워실") {
        record.has_shower = Some(true);
    }
    if record.is_24h.is_none() {
        record.is_24h = match (record.open_hour.as_deref(), record.close_hour.as_deref()) {
            (Some(open), Some(close)) => Some(open == "00:00" && (close == "24:00" || close == "00:00")),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> BaselineRecord {
        let mut record = BaselineRecord::new(
            "파워 피트니스",
            "서울시 강남구 테헤란로 123",
            "public_data",
            0.9,
        );
        record.phone = Some("02-1111-2222".to_string());
        record
    }

    fn rich_observation() -> Observation {
        let mut obs = Observation::new("파워 피트니스", "naver", 0.75);
        obs.address = Some("서울시 강남구 테헤란로 123".to_string());
        obs.rating = Some(4.5);
        obs.review_count = Some(120);
        obs.open_hour = Some("06:00".to_string());
        obs.close_hour = Some("23:00".to_string());
        obs.monthly_fee = Some(99_000);
        obs.facilities = vec!["샤워실".to_string(), "주차장".to_string()];
        obs.services = vec!["PT".to_string(), "GX".to_string()];
        obs
    }

    #[test]
    fn test_observation_fills_missing_fields() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();

        let record = fuser.fuse(&baseline(), &rich_observation(), &mut conflicts);

        assert_eq!(record.rating, Some(4.5));
        assert_eq!(record.review_count, Some(120));
        assert_eq!(record.open_hour.as_deref(), Some("06:00"));
        assert_eq!(record.monthly_fee, Some(99_000));
        assert_eq!(record.has_pt, Some(true));
        assert_eq!(record.has_gx, Some(true));
        assert_eq!(record.has_parking, Some(true));
        assert_eq!(record.has_shower, Some(true));
        assert_eq!(record.is_24h, Some(false));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_baseline_wins_phone_conflict() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();
        let mut obs = rich_observation();
        obs.phone = Some("02-3333-4444".to_string());

        let record = fuser.fuse(&baseline(), &obs, &mut conflicts);

        assert_eq!(record.phone.as_deref(), Some("02-1111-2222"));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "phone");
        assert_eq!(conflicts[0].baseline_value, "02-1111-2222");
        assert_eq!(conflicts[0].observed_value, "02-3333-4444");
    }

    #[test]
    fn test_same_phone_different_formatting_is_no_conflict() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();
        let mut obs = rich_observation();
        obs.phone = Some("0211112222".to_string());

        fuser.fuse(&baseline(), &obs, &mut conflicts);

        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_address_disagreement_is_logged_not_adopted() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();
        let mut obs = rich_observation();
        obs.address = Some("서울시 서초구 반포대로 55".to_string());

        let record = fuser.fuse(&baseline(), &obs, &mut conflicts);

        assert_eq!(record.address, "서울시 강남구 테헤란로 123");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "address");
    }

    #[test]
    fn test_source_union_and_confidence_max() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();
        let mut obs = rich_observation();
        obs.confidence = 0.95;

        let record = fuser.fuse(&baseline(), &obs, &mut conflicts);

        assert_eq!(record.source, "public_data + naver");
        assert_eq!(record.confidence, 0.95);
        assert!(record.crawled_at.is_some());
    }

    #[test]
    fn test_repeated_source_is_not_duplicated() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();
        let mut base = baseline();
        base.source = "public_data + naver".to_string();

        let record = fuser.fuse(&base, &rich_observation(), &mut conflicts);

        assert_eq!(record.source, "public_data + naver");
    }

    #[test]
    fn test_carry_baseline_floors_confidence() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut base = baseline();
        base.confidence = 0.1;

        let record = fuser.carry_baseline(&base);

        assert_eq!(record.confidence, 0.3);
        assert_eq!(record.source, "public_data");
        assert!(record.crawled_at.is_none());
    }

    #[test]
    fn test_carry_baseline_labels_empty_source() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut base = baseline();
        base.source = String::new();

        let record = fuser.carry_baseline(&base);

        assert_eq!(record.source, "baseline");
    }

    #[test]
    fn test_record_from_observation() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut obs = rich_observation();
        obs.open_hour = Some("00:00".to_string());
        obs.close_hour = Some("24:00".to_string());

        let record = fuser.record_from_observation(&obs);

        assert_eq!(record.name, "파워 피트니스");
        assert_eq!(record.address, "서울시 강남구 테헤란로 123");
        assert_eq!(record.source, "naver");
        assert_eq!(record.is_24h, Some(true));
        assert!(record.crawled_at.is_some());
    }

    #[test]
    fn test_matching_values_produce_no_conflicts() {
        let fuser = RecordFuser::new(FusionConfig::default());
        let mut conflicts = Vec::new();
        let mut obs = rich_observation();
        obs.phone = Some("02-1111-2222".to_string());

        let record = fuser.fuse(&baseline(), &obs, &mut conflicts);

        assert!(conflicts.is_empty());
        assert_eq!(record.name, "파워 피트니스");
    }
}
