//! Naver search adapter
//!
//! Naver carries the richest gym listing data of the engines (place cards
//! with hours, fees, amenities, visitor reviews), so this adapter runs the
//! full extraction set. Requests go through the jittered pacer with a
//! rotating User-Agent; a 403 starts the escalating cooldown and the adapter
//! reports itself unavailable until it expires.

use crate::adapters::{extract, html};
use crate::config::AdapterConfig;
use crate::ratelimit::{AntiDetection, RateLimiter};
use crate::types::{FetchError, SearchTarget, SourceAdapter};
use async_trait::async_trait;
use gymdex_common::records::Observation;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://search.naver.com/search.naver";
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

pub const NAVER_CONFIDENCE: f32 = 0.75;

pub struct NaverSearchAdapter {
    client: reqwest::Client,
    pacer: RateLimiter,
    anti: AntiDetection,
}

impl NaverSearchAdapter {
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
            .query(&[("where", "nexearch"), ("query", query)])
            .header(reqwest::header::USER_AGENT, self.anti.next_user_agent())
            .header(reqwest::header::ACCEPT_LANGUAGE, "ko-KR,ko;q=0.9")
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if status.as_u16() == 403 {
            let cooldown = self.anti.record_block();
            warn!(
                source = "naver",
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

/// Naver answers best with the district ahead of the name
fn build_query(target: &SearchTarget) -> String {
    match &target.address {
        Some(address) => {
            let district: Vec<&str> = address.split_whitespace().take(2).collect();
            format!("{} {}", district.join(" "), target.name)
        }
        None => format!("{} 헬스장", target.name),
    }
}

fn parse_observation(body: &str, target: &SearchTarget) -> Option<Observation> {
    let text = html::flatten(body);
    let relevance = extract::relevance_factor(&text);

    let mut obs = Observation::new(target.name.clone(), "naver", NAVER_CONFIDENCE * relevance);
    obs.address = extract::extract_address(&text);
    obs.phone = extract::extract_phone(&text);
    if let Some((open, close)) = extract::extract_hours(&text) {
        obs.open_hour = Some(open);
        obs.close_hour = Some(close);
    }
    let (monthly, day_pass) = extract::extract_prices(&text);
    obs.monthly_fee = monthly;
    obs.day_pass_fee = day_pass;
    obs.rating = extract::extract_rating(&text);
    obs.review_count = extract::extract_review_count(&text);
    obs.facilities = extract::extract_facilities(&text);
    obs.services = extract::extract_services(&text);
    obs.instagram = extract::extract_instagram(&text);

    if obs.is_empty_extraction() {
        return None;
    }
    Some(obs)
}

#[async_trait]
impl SourceAdapter for NaverSearchAdapter {
    fn name(&self) -> &'static str {
        "naver"
    }

    fn base_confidence(&self) -> f32 {
        NAVER_CONFIDENCE
    }

    fn is_available(&self) -> bool {
        !self.anti.is_cooling_down()
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        self.anti.cooldown_remaining()
    }

    async fn search(&self, target: &SearchTarget) -> Result<Option<Observation>, FetchError> {
        let query = build_query(target);
        debug!(source = "naver", query = %query, "Searching");
        let body = self.fetch_results(&query).await?;
        Ok(parse_observation(&body, target))
    }
}
