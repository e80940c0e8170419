//! Google search adapter
//!
//! Google rarely surfaces Korean gym pricing, but its knowledge panel is a
//! reliable source of ratings, review counts and operating hours. Google
//! signals blocks two ways: a plain 403, and a 200 with the "unusual
//! traffic" interstitial. Both start the cooldown.

use crate::adapters::{extract, html};
use crate::config::AdapterConfig;
use crate::ratelimit::{AntiDetection, RateLimiter};
use crate::types::{FetchError, SearchTarget, SourceAdapter};
use async_trait::async_trait;
use gymdex_common::records::Observation;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://www.google.com/search";
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

pub const GOOGLE_CONFIDENCE: f32 = 0.7;

pub struct GoogleSearchAdapter {
    client: reqwest::Client,
    pacer: RateLimiter,
    anti: AntiDetection,
}

impl GoogleSearchAdapter {
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
            .query(&[("q", query), ("hl", "ko"), ("num", "10")])
            .header(reqwest::header::USER_AGENT, self.anti.next_user_agent())
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if status.as_u16() == 403 {
            return Err(self.note_block());
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
        if is_soft_block(&body) {
            return Err(self.note_block());
        }

        self.anti.record_success();
        Ok(body)
    }

    fn note_block(&self) -> FetchError {
        let cooldown = self.anti.record_block();
        warn!(
            source = "google",
            cooldown_ms = cooldown.as_millis() as u64,
            consecutive_blocks = self.anti.consecutive_blocks(),
            "Search engine blocked the request, backing off"
        );
        FetchError::Blocked
    }
}

/// CAPTCHA interstitial served with a 200
fn is_soft_block(body: &str) -> bool {
    body.contains("/sorry/index") || body.contains("unusual traffic")
}

/// Exact-name query; the quotes cut unrelated matches sharply
fn build_query(target: &SearchTarget) -> String {
    match &target.address {
        Some(address) => format!("\"{}\" {}", target.name, address),
        None => format!("\"{}\"", target.name),
    }
}

fn parse_observation(body: &str, target: &SearchTarget) -> Option<Observation> {
    let text = html::flatten(body);
    let relevance = extract::relevance_factor(&text);

    let mut obs = Observation::new(target.name.clone(), "google", GOOGLE_CONFIDENCE * relevance);
    obs.phone = extract::extract_phone(&text);
    if let Some((open, close)) = extract::extract_hours(&text) {
        obs.open_hour = Some(open);
        obs.close_hour = Some(close);
    }
    obs.rating = extract::extract_rating(&text);
    obs.review_count = extract::extract_review_count(&text);

    if obs.is_empty_extraction() {
        return None;
    }
    Some(obs)
}

#[async_trait]
impl SourceAdapter for GoogleSearchAdapter {
    fn name(&self) -> &'static str {
        "google"
    }

    fn base_confidence(&self) -> f32 {
        GOOGLE_CONFIDENCE
    }

    fn is_available(&self) -> bool {
        !self.anti.is_cooling_down()
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        self.anti.cooldown_remaining()
    }

    async fn search(&self, target: &SearchTarget) -> Result<Option<Observation>, FetchError> {
        let query = build_query(target);
        debug!(source = "google", query = %query, "Searching");
        let body = self.fetch_results(&query).await?;
        Ok(parse_observation(&body, target))
    }
}
