//! Public dataset adapter
//!
//! Talks to the municipal open-data API (LOCALDATA sports-facility registry).
//! Serves two roles: bulk baseline collection at harvest start, and the
//! highest-confidence single lookup source. The API publishes its rate limit,
//! so pacing is a plain `governor` quota rather than the jittered pacer the
//! search engines get.

use crate::config::AdapterConfig;
use crate::ratelimit::{per_second_limiter, ApiRateLimiter};
use crate::types::{FetchError, SearchTarget, SourceAdapter};
use async_trait::async_trait;
use gymdex_common::records::{normalize_key_part, BaselineRecord, Observation};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const DATASET_BASE_URL: &str = "http://openapi.seoul.go.kr:8088";
/// Registered sports-facility service of the LOCALDATA catalogue
const DATASET_SERVICE: &str = "LOCALDATA_104201";
const PAGE_SIZE: usize = 1000;
/// Hard cap on rows pulled in one bulk collection
const MAX_ROWS: usize = 10_000;
/// Hard cap on a single response body
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
const REQUESTS_PER_SECOND: u32 = 5;

pub const PUBLIC_DATA_CONFIDENCE: f32 = 0.9;

/// One row of the facility registry
///
/// Field names follow the upstream schema; everything except the business
/// name is routinely blank.
#[derive(Debug, Clone, Deserialize)]
struct DatasetRow {
    #[serde(rename = "BPLCNM", default)]
    name: String,
    #[serde(rename = "RDNWHLADDR", default)]
    road_address: String,
    #[serde(rename = "SITEWHLADDR", default)]
    lot_address: String,
    #[serde(rename = "SITETEL", default)]
    phone: String,
    #[serde(rename = "TRDSTATENM", default)]
    business_status: String,
    #[serde(rename = "UPTAENM", default)]
    category: String,
    #[serde(rename = "Y", default)]
    latitude: String,
    #[serde(rename = "X", default)]
    longitude: String,
}

impl DatasetRow {
    fn is_closed(&self) -> bool {
        self.business_status.contains("폐업")
    }

    /// Road address preferred, lot address as fallback
    fn best_address(&self) -> Option<&str> {
        let road = self.road_address.trim();
        if !road.is_empty() {
            return Some(road);
        }
        let lot = self.lot_address.trim();
        if !lot.is_empty() {
            return Some(lot);
        }
        None
    }

    fn into_baseline(self) -> Option<BaselineRecord> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let address = self.best_address()?.to_string();

        let mut record =
            BaselineRecord::new(name, address, "public_data", PUBLIC_DATA_CONFIDENCE);
        let phone = self.phone.trim();
        if !phone.is_empty() {
            record.phone = Some(phone.to_string());
        }
        if !self.business_status.is_empty() {
            record.business_status = Some(self.business_status.clone());
        }
        if !self.category.is_empty() {
            record.category = Some(self.category.clone());
        }
        record.latitude = self.latitude.trim().parse().ok();
        record.longitude = self.longitude.trim().parse().ok();
        Some(record)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServicePayload {
    #[serde(rename = "list_total_count", default)]
    total_count: u64,
    #[serde(default)]
    row: Vec<DatasetRow>,
}

/// Public dataset API client
pub struct PublicDataAdapter {
    client: reqwest::Client,
    api_key: String,
    limiter: ApiRateLimiter,
}

impl PublicDataAdapter {
    pub fn new(api_key: String, config: &AdapterConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            limiter: per_second_limiter(REQUESTS_PER_SECOND),
        })
    }

    /// Pull the whole facility registry as baseline records
    ///
    /// Pages through the dataset in `PAGE_SIZE` chunks until a short page or
    /// the row cap. Closed and incomplete rows are dropped with counts
    /// reported at the end.
    pub async fn collect_all(&self) -> Result<Vec<BaselineRecord>, FetchError> {
        let mut records = Vec::new();
        let mut skipped_closed = 0usize;
        let mut skipped_incomplete = 0usize;
        let mut start = 1usize;

        loop {
            let end = start + PAGE_SIZE - 1;
            let payload = self.fetch_page(start, end, None).await?;
            let page_len = payload.row.len();

            for row in payload.row {
                if row.is_closed() {
                    skipped_closed += 1;
                    continue;
                }
                match row.into_baseline() {
                    Some(record) => records.push(record),
                    None => skipped_incomplete += 1,
                }
            }

            debug!(
                start = start,
                page_rows = page_len,
                total = payload.total_count,
                "Fetched dataset page"
            );

            if page_len < PAGE_SIZE {
                break;
            }
            if records.len() >= MAX_ROWS {
                warn!(
                    collected = records.len(),
                    cap = MAX_ROWS,
                    "Baseline collection hit the row cap, stopping early"
                );
                break;
            }
            start += PAGE_SIZE;
        }

        info!(
            collected = records.len(),
            skipped_closed = skipped_closed,
            skipped_incomplete = skipped_incomplete,
            "Baseline collection finished"
        );
        Ok(records)
    }

    async fn fetch_page(
        &self,
        start: usize,
        end: usize,
        name_filter: Option<&str>,
    ) -> Result<ServicePayload, FetchError> {
        self.limiter.until_ready().await;

        let mut url = format!(
            "{}/{}/json/{}/{}/{}",
            DATASET_BASE_URL, self.api_key, DATASET_SERVICE, start, end
        );
        if let Some(name) = name_filter {
            // Positional value filter on the business name column
            url.push('/');
            url.push_str(name);
        }

        let response = self.client.get(&url).send().await.map_err(FetchError::from)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), text));
        }

        let body = response.text().await.map_err(FetchError::from)?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::Parse(format!(
                "dataset response of {} bytes exceeds the size cap",
                body.len()
            )));
        }

        parse_payload(&body)
    }
}

/// Unwrap the service envelope
///
/// The API answers 200 OK even for failures; errors surface as a RESULT
/// code instead of the service payload. INFO-200 means an empty result set,
/// not an error.
fn parse_payload(body: &str) -> Result<ServicePayload, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("dataset response is not JSON: {}", e)))?;

    if let Some(payload) = value.get(DATASET_SERVICE) {
        return serde_json::from_value(payload.clone())
            .map_err(|e| FetchError::Parse(format!("unexpected dataset payload shape: {}", e)));
    }

    let code = value
        .pointer("/RESULT/CODE")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown");
    if code.starts_with("INFO-200") {
        return Ok(ServicePayload::default());
    }
    Err(FetchError::Parse(format!(
        "dataset API answered with code {}",
        code
    )))
}

#[async_trait]
impl SourceAdapter for PublicDataAdapter {
    fn name(&self) -> &'static str {
        "public_data"
    }

    fn base_confidence(&self) -> f32 {
        PUBLIC_DATA_CONFIDENCE
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, target: &SearchTarget) -> Result<Option<Observation>, FetchError> {
        let target_key = normalize_key_part(&target.name);
        if target_key.is_empty() {
            return Ok(None);
        }

        let payload = self.fetch_page(1, 5, Some(&target.name)).await?;
        for row in payload.row {
            if row.is_closed() {
                continue;
            }
            let Some(baseline) = row.into_baseline() else {
                continue;
            };
            let row_key = normalize_key_part(&baseline.name);
            if row_key.contains(&target_key) || target_key.contains(&row_key) {
                debug!(
                    name = %baseline.name,
                    address = %baseline.address,
                    "Registry lookup matched"
                );
                return Ok(Some(Observation::from_baseline(&baseline)));
            }
        }
        Ok(None)
    }
}
