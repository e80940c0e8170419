//! Source adapters
//!
//! One adapter per upstream source, all behind [`SourceAdapter`]. The
//! registry is ordered by base confidence: the public registry first, then
//! the search engines from most to least trusted.

pub mod daum;
pub mod extract;
pub mod google;
pub mod html;
pub mod naver;
pub mod public_data;

pub use daum::DaumSearchAdapter;
pub use google::GoogleSearchAdapter;
pub use naver::NaverSearchAdapter;
pub use public_data::PublicDataAdapter;

use crate::config::HarvestConfig;
use crate::types::SourceAdapter;
use std::sync::Arc;
use tracing::{info, warn};

/// The registry plus a concrete handle to the public-data adapter
///
/// Bulk dataset collection needs the concrete type; per-target search
/// goes through the trait objects. Both share one instance, so the rate
/// limiter paces every request to the dataset host.
pub struct AdapterSet {
    /// All started adapters in confidence order
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
    /// The public-data adapter, when it started
    pub public_data: Option<Arc<PublicDataAdapter>>,
}

/// Build the adapter registry in confidence order
///
/// Sources that cannot start (missing API key, client build failure) are
/// skipped with a warning; the harvest runs degraded rather than refusing
/// to run.
pub fn build_adapters(
    config: &HarvestConfig,
    data_api_key: Option<String>,
) -> Vec<Arc<dyn SourceAdapter>> {
    build_adapter_set(config, data_api_key).adapters
}

/// Like [`build_adapters`], keeping the public-data handle accessible
pub fn build_adapter_set(config: &HarvestConfig, data_api_key: Option<String>) -> AdapterSet {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    let mut public_data = None;
    let cooldown_ms = config.orchestrator.blocked_cooldown_ms;

    if config.adapters.enable_public_data {
        match data_api_key {
            Some(key) => match PublicDataAdapter::new(key, &config.adapters) {
                Ok(adapter) => {
                    let adapter = Arc::new(adapter);
                    public_data = Some(Arc::clone(&adapter));
                    adapters.push(adapter);
                }
                Err(e) => warn!(
                    source = "public_data",
                    error = %e,
                    "Skipping adapter that failed to start"
                ),
            },
            None => warn!(
                source = "public_data",
                "No dataset API key configured, source disabled"
            ),
        }
    }

    if config.adapters.enable_naver {
        match NaverSearchAdapter::new(&config.adapters, cooldown_ms) {
            Ok(adapter) => adapters.push(Arc::new(adapter)),
            Err(e) => warn!(source = "naver", error = %e, "Skipping adapter that failed to start"),
        }
    }

    if config.adapters.enable_google {
        match GoogleSearchAdapter::new(&config.adapters, cooldown_ms) {
            Ok(adapter) => adapters.push(Arc::new(adapter)),
            Err(e) => warn!(source = "google", error = %e, "Skipping adapter that failed to start"),
        }
    }

    if config.adapters.enable_daum {
        match DaumSearchAdapter::new(&config.adapters, cooldown_ms) {
            Ok(adapter) => adapters.push(Arc::new(adapter)),
            Err(e) => warn!(source = "daum", error = %e, "Skipping adapter that failed to start"),
        }
    }

    if adapters.is_empty() {
        warn!("No sources are enabled; lookups will be served by fallbacks only");
    } else {
        let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        info!(count = adapters.len(), sources = ?names, "Source adapters ready");
    }
    AdapterSet {
        adapters,
        public_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_adapters_without_key_skips_public_data() {
        let config = HarvestConfig::with_defaults();
        let adapters = build_adapters(&config, None);

        let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["naver", "google", "daum"]);
    }

    #[test]
    fn test_build_adapters_with_key_is_in_confidence_order() {
        let config = HarvestConfig::with_defaults();
        let adapters = build_adapters(&config, Some("test-key".to_string()));

        let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["public_data", "naver", "google", "daum"]);

        let confidences: Vec<f32> = adapters.iter().map(|a| a.base_confidence()).collect();
        let mut sorted = confidences.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(confidences, sorted);
    }

    #[test]
    fn test_build_adapters_all_disabled_is_empty() {
        let mut config = HarvestConfig::with_defaults();
        config.adapters.enable_public_data = false;
        config.adapters.enable_naver = false;
        config.adapters.enable_google = false;
        config.adapters.enable_daum = false;

        assert!(build_adapters(&config, Some("key".to_string())).is_empty());
    }

    #[test]
    fn test_adapter_set_shares_the_public_data_instance() {
        let config = HarvestConfig::with_defaults();

        let set = build_adapter_set(&config, Some("test-key".to_string()));
        assert!(set.public_data.is_some());
        assert_eq!(set.adapters.len(), 4);

        let set = build_adapter_set(&config, None);
        assert!(set.public_data.is_none());
    }
}
