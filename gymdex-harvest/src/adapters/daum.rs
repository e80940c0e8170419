//! Daum search adapter
//!
//! The lowest-confidence engine in the chain. Daum's integrated search is
//! thin on gym detail but good at confirming a place exists: the extraction
//! set is limited to phone, address and hours.

use crate::adapters::{extract, html};
use crate::config::AdapterConfig;
use crate::ratelimit::{AntiDetection, RateLimiter};
use crate::types::{FetchError, SearchTarget, SourceAdapter};
use async_trait::async_trait;
use gymdex_common::records::Observation;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://search.daum.net/search";
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

pub const DAUM_CONFIDENCE: f32 = 0.6;

pub struct DaumSearchAdapter {
    client: reqwest::Client,
    pacer: RateLimiter,
    anti: AntiDetection,
}

impl DaumSearchAdapter {
    pub fn new(config: &AdapterConfig, blocked_cooldown_ms: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            pacer: RateLimiter::new(config.min_request_interval_ms),
            anti: AntiDetection::new(blocked_cooldown_ms),
        })
    }

    async fn fetch_results(&self, query: &str) -> Result<String, FetchError> {
        self.pacer.wait().await;

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("w", "tot"), ("q", query)])
            .header(reqwest::header::USER_AGENT, self.anti.next_user_agent())
            .header(reqwest::header::ACCEPT_LANGUAGE, "ko-KR,ko;q=0.9")
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if status.as_u16() == 403 {
            let cooldown = self.anti.record_block();
            warn!(
                source = "daum",
                cooldown_ms = cooldown.as_millis() as u64,
                consecutive_blocks = self.anti.consecutive_blocks(),
                "Search engine blocked the request, backing off"
            );
            return Err(FetchError::Blocked);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), text));
        }

        let body = response.text().await.map_err(FetchError::from)?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::Parse(format!(
                "results page of {} bytes exceeds the size cap",
                body.len()
            )));
        }

        self.anti.record_success();
        Ok(body)
    }
}

fn build_query(target: &SearchTarget) -> String {
    match &target.address {
        Some(address) => {
            let district = address.split_whitespace().nth(1).unwrap_or_default();
            format!("{} {}", target.name, district).trim_end().to_string()
        }
        None => target.name.clone(),
    }
}

fn parse_observation(body: &str, target: &SearchTarget) -> Option<Observation> {
    let text = html::flatten(body);
    let relevance = extract::relevance_factor(&text);

    let mut obs = Observation::new(target.name.clone(), "daum", DAUM_CONFIDENCE * relevance);
    obs.phone = extract::extract_phone(&text);
    obs.address = extract::extract_address(&text);
    if let Some((open, close)) = extract::extract_hours(&text) {
        obs.open_hour = Some(open);
        obs.close_hour = Some(close);
    }

    if obs.is_empty_extraction() {
        return None;
    }
    Some(obs)
}

#[async_trait]
impl SourceAdapter for DaumSearchAdapter {
    fn name(&self) -> &'static str {
        "daum"
    }

    fn base_confidence(&self) -> f32 {
        DAUM_CONFIDENCE
    }

    fn is_available(&self) -> bool {
        !self.anti.is_cooling_down()
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        self.anti.cooldown_remaining()
    }

    async fn search(&self, target: &SearchTarget) -> Result<Option<Observation>, FetchError> {
        let query = build_query(target);
        debug!(source = "daum", query = %query, "Searching");
        let body = self.fetch_results(&query).await?;
        Ok(parse_observation(&body, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_appends_district() {
        let target = SearchTarget::with_address("바디 짐", "서울특별시 송파구 올림픽로 300");
        assert_eq!(build_query(&target), "바디 짐 송파구");
    }

    #[test]
    fn test_build_query_name_only() {
        let target = SearchTarget::new("바디 짐");
        assert_eq!(build_query(&target), "바디 짐");
    }

    #[test]
    fn test_parse_observation_contact_fields() {
        let body = r#"
            <html><body>
            <div>바디 짐 헬스 전문</div>
            <span>서울특별시 송파구 올림픽로 300</span>
            <span>051-777-8888</span>
            <span>06:30~23:00</span>
            </body></html>
        "#;
        let target = SearchTarget::new("바디 짐");
        let obs = parse_observation(body, &target).unwrap();

        assert_eq!(obs.source, "daum");
        assert_eq!(obs.phone.as_deref(), Some("051-777-8888"));
        assert_eq!(obs.address.as_deref(), Some("서울특별시 송파구 올림픽로 300"));
        assert_eq!(obs.open_hour.as_deref(), Some("06:30"));
        assert!(obs.monthly_fee.is_none());
    }

    #[test]
    fn test_parse_observation_empty_page_is_none() {
        let target = SearchTarget::new("바디 짐");
        assert!(parse_observation("<html><body></body></html>", &target).is_none());
    }
}
