//! Validation and quality measurement for crawl output

pub mod quality_scorer;
pub mod record_validator;

pub use quality_scorer::QualityScorer;
pub use record_validator::DataValidator;
