//! Record fusion
//!
//! Turns one run's baseline records and crawled observations into a
//! single deduplicated, confidence-scored record set. Matching is fuzzy
//! (similarity over normalized fields), merging is field-wise with the
//! baseline authoritative, and every disagreement is kept as a conflict
//! entry rather than silently dropped.

pub mod fuser;
pub mod matcher;
pub mod pipeline;
pub mod similarity;

pub use fuser::RecordFuser;
pub use matcher::{MatchOutcome, MatchPair, RecordMatcher};
pub use pipeline::{FusionOutcome, FusionPipeline};
