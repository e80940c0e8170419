//! Core types and trait definitions for the harvest engine
//!
//! Defines the base traits of the search-and-fusion pipeline:
//! - **SourceAdapter**: one data source (public dataset or web search engine)
//! - **FetchError**: transport error taxonomy driving retry/fallback policy
//! - **SearchTarget**: one facility to look up

use gymdex_common::records::Observation;
use thiserror::Error;

// ============================================================================
// Search Target
// ============================================================================

/// One facility to look up across the configured sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    /// Facility name to query
    pub name: String,
    /// Known address, used to sharpen queries and similarity checks
    pub address: Option<String>,
}

impl SearchTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
        }
    }

    pub fn with_address(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: Some(address.into()),
        }
    }
}

// ============================================================================
// Transport Error Taxonomy
// ============================================================================

/// Transport-level fetch errors
///
/// Classification drives the retry/fallback policy:
/// - retryable: network failures, timeouts, 5xx, 429, 408
/// - blocked: 403 escalates to cooldown + fallback, never re-retried on the
///   same adapter for the same target
/// - everything else propagates immediately
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connect, TLS, broken transfer)
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its timeout
    #[error("Request timed out")]
    Timeout,

    /// Source answered 429 Too Many Requests
    #[error("Rate limited by source")]
    RateLimited,

    /// Source answered 403, a ban/block signal rather than ordinary transience
    #[error("Source blocked the request (HTTP 403)")]
    Blocked,

    /// Any other non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Map an HTTP status code to the matching error class
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            403 => FetchError::Blocked,
            429 => FetchError::RateLimited,
            408 => FetchError::Timeout,
            _ => FetchError::Http {
                status,
                message: message.into(),
            },
        }
    }

    /// True for errors worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Timeout => true,
            FetchError::RateLimited => true,
            FetchError::Http { status, .. } => *status >= 500,
            FetchError::Blocked => false,
            FetchError::Parse(_) => false,
        }
    }

    /// True for block signals, which take the cooldown + fallback path
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Blocked)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::from_status(status.as_u16(), e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

// ============================================================================
// Source Adapter Trait
// ============================================================================

/// One data source turning a facility name/address into at most one
/// partial observation
///
/// All adapters implement this trait for uniform registry dispatch. An
/// adapter never errors for "no data found"; that is `Ok(None)`. Errors are
/// transport failures only, classified by [`FetchError`] so the caller can
/// retry, cool down, or fall back.
///
/// # Example
/// ```rust,ignore
/// use gymdex_harvest::types::{SourceAdapter, SearchTarget, FetchError};
/// use gymdex_common::records::Observation;
///
/// pub struct NaverSearchAdapter { /* client, pacer */ }
///
/// #[async_trait::async_trait]
/// impl SourceAdapter for NaverSearchAdapter {
///     fn name(&self) -> &'static str { "naver" }
///     fn base_confidence(&self) -> f32 { 0.75 }
///
///     async fn search(&self, target: &SearchTarget) -> Result<Option<Observation>, FetchError> {
///         let html = self.fetch_results_page(target).await?;
///         Ok(self.extract_observation(&html, target))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name for provenance tracking
    fn name(&self) -> &'static str;

    /// Base confidence score for this source (0.0-1.0)
    ///
    /// Reflects source trustworthiness: the registered public dataset sits
    /// near 0.9, primary search engines 0.7-0.8, secondary/blog tiers 0.5-0.6.
    /// Per-observation confidence may be reduced below this when the
    /// extraction is thin.
    fn base_confidence(&self) -> f32;

    /// Whether the adapter can currently be used
    ///
    /// A public-data adapter without an API key reports false and is skipped
    /// rather than failing the run. Search engine adapters report false
    /// while a block cooldown is in force.
    fn is_available(&self) -> bool {
        true
    }

    /// Remaining block cooldown, when the source is sitting one out
    ///
    /// Used for event payloads and skip logging; `None` for adapters that
    /// never get blocked.
    fn cooldown_remaining(&self) -> Option<std::time::Duration> {
        None
    }

    /// Look up one facility
    ///
    /// # Returns
    /// - `Ok(Some(observation))`: extraction found something
    /// - `Ok(None)`: source answered but nothing useful was found
    ///
    /// # Errors
    /// Transport failures only, classified per [`FetchError`]
    async fn search(&self, target: &SearchTarget) -> Result<Option<Observation>, FetchError>;
}

// ============================================================================
// Tests
// ============================================================================
