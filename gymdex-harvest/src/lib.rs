//! # Gymdex Harvest
//!
//! The crawling-and-fusion engine: collects gym facility records from a keyed
//! public dataset and several web search engines, then fuses every observation
//! of the same real-world facility into one canonical confidence-scored record.
//!
//! Pipeline: targets → [`scheduler::BatchScheduler`] → per target
//! [`orchestrator::SearchOrchestrator`] over the [`adapters`] (with retry,
//! rate limiting and the [`fallback::FallbackChain`]) → observations →
//! [`fusion`] against the baseline dataset → canonical records, statistics
//! and a conflict log. [`service::HarvestService`] is the top-level entry.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod fusion;
pub mod orchestrator;
pub mod ratelimit;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;
pub mod validators;

pub use crate::error::ServiceError;
pub use crate::service::{HarvestReport, HarvestService};
pub use crate::types::{FetchError, SearchTarget, SourceAdapter};
