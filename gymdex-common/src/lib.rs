//! # Gymdex Common Library
//!
//! Shared code for the gymdex workspace including:
//! - Facility record models (baseline, observation, canonical)
//! - Event types (HarvestEvent enum) and the EventBus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod records;

pub use error::{Error, Result};
pub use records::{BaselineRecord, FacilityKind, FacilityRecord, Observation};
