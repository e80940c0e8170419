//! Facility record models
//!
//! Three record shapes flow through a harvest run:
//! - **BaselineRecord**: facility as known before crawling (public dataset
//!   rows or previously persisted records); immutable input.
//! - **Observation**: one adapter's partial, unverified view of a facility;
//!   ephemeral, consumed by fusion.
//! - **FacilityRecord**: the fused canonical output with provenance and a
//!   combined confidence score.
//!
//! All confidence scores are clamped to 0.0-1.0 at construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of each half of a dedup key
const KEY_PART_MAX_CHARS: usize = 60;

/// Clamp a confidence score to the valid 0.0-1.0 range (NaN maps to 0.0)
pub fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Normalize one component of a dedup key: lowercase, strip all whitespace,
/// cap length so pathological inputs cannot blow up key storage
pub fn normalize_key_part(part: &str) -> String {
    part.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(KEY_PART_MAX_CHARS)
        .collect()
}

/// Dedup key for a facility: `normalize(name) + "-" + normalize(address)`
///
/// Unique across any deduplicated output set.
pub fn facility_key(name: &str, address: &str) -> String {
    format!("{}-{}", normalize_key_part(name), normalize_key_part(address))
}

/// Facility operation type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FacilityKind {
    /// Privately operated gym
    #[default]
    Private,
    /// Public (municipal) sports facility
    Public,
}

/// Facility as known before crawling
///
/// Supplied by the external store or by the public dataset collection phase.
/// The harvest never mutates a baseline record; fusion copies from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Facility name
    pub name: String,
    /// Road or lot address
    pub address: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Where this record came from (e.g. "public_data", "store")
    pub source: String,
    /// Trust score (0.0-1.0)
    pub confidence: f32,
    /// Business status from the public dataset (e.g. "영업/정상")
    pub business_status: Option<String>,
    /// Dataset category label
    pub category: Option<String>,
    /// WGS84 latitude, when the dataset provides one in range
    pub latitude: Option<f64>,
    /// WGS84 longitude, when the dataset provides one in range
    pub longitude: Option<f64>,
}

impl BaselineRecord {
    /// Create a baseline record with clamped confidence
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        source: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phone: None,
            source: source.into(),
            confidence: clamp_confidence(confidence),
            business_status: None,
            category: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Baseline view of an already-fused record
    ///
    /// Crawl-derived fields (rating, hours, fees) are dropped; the next
    /// harvest re-collects them fresh.
    pub fn from_record(record: &FacilityRecord) -> Self {
        Self {
            name: record.name.clone(),
            address: record.address.clone(),
            phone: record.phone.clone(),
            source: record.source.clone(),
            confidence: clamp_confidence(record.confidence),
            business_status: record.business_status.clone(),
            category: record.category.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
        }
    }

    /// Dedup key for this record
    pub fn normalized_key(&self) -> String {
        facility_key(&self.name, &self.address)
    }
}

/// One adapter's partial view of a facility
///
/// Every field except `name`, `source` and `confidence` is optional;
/// adapters return only what they could extract. Discarded after fusion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Facility name as seen by the adapter
    pub name: String,
    /// Address, when extracted
    pub address: Option<String>,
    /// Phone number, when extracted
    pub phone: Option<String>,
    /// Rating (0.0-5.0)
    pub rating: Option<f32>,
    /// Number of reviews
    pub review_count: Option<u32>,
    /// Opening hour, "HH:MM"
    pub open_hour: Option<String>,
    /// Closing hour, "HH:MM"
    pub close_hour: Option<String>,
    /// Monthly membership fee in KRW
    pub monthly_fee: Option<u32>,
    /// Single-visit fee in KRW
    pub day_pass_fee: Option<u32>,
    /// Facility keywords found near the result (GX room, shower, ...)
    pub facilities: Vec<String>,
    /// Service keywords found near the result (PT, yoga, ...)
    pub services: Vec<String>,
    /// Homepage URL, when extracted
    pub homepage: Option<String>,
    /// Instagram handle or URL, when extracted
    pub instagram: Option<String>,
    /// Adapter name that produced this observation
    pub source: String,
    /// Trust score (0.0-1.0)
    pub confidence: f32,
    /// Private vs public facility
    pub kind: FacilityKind,
}

impl Observation {
    /// Create an observation with clamped confidence
    pub fn new(name: impl Into<String>, source: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            confidence: clamp_confidence(confidence),
            ..Default::default()
        }
    }

    /// True when extraction found nothing beyond the queried name
    pub fn is_empty_extraction(&self) -> bool {
        self.address.is_none()
            && self.phone.is_none()
            && self.rating.is_none()
            && self.review_count.is_none()
            && self.open_hour.is_none()
            && self.close_hour.is_none()
            && self.monthly_fee.is_none()
            && self.day_pass_fee.is_none()
            && self.facilities.is_empty()
            && self.services.is_empty()
            && self.homepage.is_none()
            && self.instagram.is_none()
    }

    /// View a baseline record as an observation so it can enter fusion
    pub fn from_baseline(record: &BaselineRecord) -> Self {
        Self {
            name: record.name.clone(),
            address: Some(record.address.clone()),
            phone: record.phone.clone(),
            source: record.source.clone(),
            confidence: clamp_confidence(record.confidence),
            ..Default::default()
        }
    }
}

/// Canonical fused facility record
///
/// Superset of baseline and observation fields. `source` lists every
/// contributor joined with `" + "`; `confidence` is the combined score of
/// all contributors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRecord {
    /// Facility name
    pub name: String,
    /// Road or lot address
    pub address: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Rating (0.0-5.0)
    pub rating: Option<f32>,
    /// Number of reviews
    pub review_count: Option<u32>,
    /// Opening hour, "HH:MM"
    pub open_hour: Option<String>,
    /// Closing hour, "HH:MM"
    pub close_hour: Option<String>,
    /// Monthly membership fee in KRW
    pub monthly_fee: Option<u32>,
    /// Single-visit fee in KRW
    pub day_pass_fee: Option<u32>,
    /// Facility keywords (deduplicated union of all contributors)
    pub facilities: Vec<String>,
    /// Service keywords (deduplicated union of all contributors)
    pub services: Vec<String>,
    /// Homepage URL
    pub homepage: Option<String>,
    /// Instagram handle or URL
    pub instagram: Option<String>,
    /// Group exercise (GX) program offered
    pub has_gx: Option<bool>,
    /// Personal training offered
    pub has_pt: Option<bool>,
    /// Open 24 hours
    pub is_24h: Option<bool>,
    /// Parking available
    pub has_parking: Option<bool>,
    /// Shower room available
    pub has_shower: Option<bool>,
    /// Business status from the public dataset
    pub business_status: Option<String>,
    /// Dataset category label
    pub category: Option<String>,
    /// WGS84 latitude
    pub latitude: Option<f64>,
    /// WGS84 longitude
    pub longitude: Option<f64>,
    /// "+"-joined list of contributing source names
    pub source: String,
    /// Combined trust score (0.0-1.0)
    pub confidence: f32,
    /// Private vs public facility
    pub kind: FacilityKind,
    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
    /// When the contributing crawl ran (None for carried-through baselines)
    pub crawled_at: Option<DateTime<Utc>>,
}

impl FacilityRecord {
    /// Build a canonical record from a baseline alone (no crawl contribution)
    pub fn from_baseline(record: &BaselineRecord) -> Self {
        Self {
            name: record.name.clone(),
            address: record.address.clone(),
            phone: record.phone.clone(),
            rating: None,
            review_count: None,
            open_hour: None,
            close_hour: None,
            monthly_fee: None,
            day_pass_fee: None,
            facilities: Vec::new(),
            services: Vec::new(),
            homepage: None,
            instagram: None,
            has_gx: None,
            has_pt: None,
            is_24h: None,
            has_parking: None,
            has_shower: None,
            business_status: record.business_status.clone(),
            category: record.category.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            source: record.source.clone(),
            confidence: clamp_confidence(record.confidence),
            kind: FacilityKind::default(),
            updated_at: Utc::now(),
            crawled_at: None,
        }
    }

    /// Dedup key for this record
    pub fn normalized_key(&self) -> String {
        facility_key(&self.name, &self.address)
    }
}

/// How a recorded field discrepancy was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Baseline value kept
    KeptBaseline,
    /// Observation value adopted (baseline side was empty)
    AdoptedObservation,
    /// Both sides merged (array fields)
    Merged,
}

/// One field-level discrepancy between a baseline record and an observation
///
/// Append-only: conflicts record what fusion saw, they never mutate records
/// or block a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Dedup key of the affected facility
    pub entity_key: String,
    /// Field name the two sides disagreed on
    pub field: String,
    /// Value on the baseline side
    pub baseline_value: String,
    /// Value on the observation side
    pub observed_value: String,
    /// Which side the merge kept
    pub resolution: ConflictResolution,
    /// When the discrepancy was detected
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Record a discrepancy settled in favor of the baseline value
    pub fn kept_baseline(
        entity_key: impl Into<String>,
        field: impl Into<String>,
        baseline_value: impl Into<String>,
        observed_value: impl Into<String>,
    ) -> Self {
        Self {
            entity_key: entity_key.into(),
            field: field.into(),
            baseline_value: baseline_value.into(),
            observed_value: observed_value.into(),
            resolution: ConflictResolution::KeptBaseline,
            detected_at: Utc::now(),
        }
    }
}
