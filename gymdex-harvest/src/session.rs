//! Harvest session state machine
//!
//! A session progresses through:
//! PENDING → COLLECTING_BASELINE → SEARCHING → FUSING → COMPLETED,
//! ending in FAILED or CANCELLED when a run does not finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Harvest workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created, not started yet
    Pending,
    /// Reading the store and the public dataset
    CollectingBaseline,
    /// Crawling search sources per target
    Searching,
    /// Matching and merging results
    Fusing,
    /// Run finished successfully
    Completed,
    /// Run failed with a critical error
    Failed,
    /// Run cancelled by the caller
    Cancelled,
}

/// State transition record, for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub transitioned_at: DateTime<Utc>,
}

/// One harvest run's in-memory state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSession {
    /// Unique session identifier
    pub id: Uuid,

    /// Current workflow state
    pub state: SessionState,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time, set on terminal states
    pub ended_at: Option<DateTime<Utc>>,

    /// Targets queued for the search phase
    pub total_targets: usize,

    /// Targets finished so far
    pub current_target: usize,

    /// Percentage complete (0.0 - 100.0)
    pub progress_percentage: f32,

    /// Elapsed time in seconds
    pub elapsed_seconds: u64,

    /// Rate-based remaining estimate, None before any progress
    pub estimated_remaining_seconds: Option<u64>,

    /// Failure description for FAILED sessions
    pub error_message: Option<String>,
}

impl HarvestSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Pending,
            started_at: Utc::now(),
            ended_at: None,
            total_targets: 0,
            current_target: 0,
            progress_percentage: 0.0,
            elapsed_seconds: 0,
            estimated_remaining_seconds: None,
            error_message: None,
        }
    }

    /// Move to a new state, stamping ended_at on terminal states
    pub fn transition_to(&mut self, new_state: SessionState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        transition
    }

    /// Update progress counters and the remaining-time estimate
    pub fn update_progress(&mut self, current: usize, total: usize) {
        self.current_target = current;
        self.total_targets = total;
        self.progress_percentage = if total > 0 {
            (current as f32 / total as f32) * 100.0
        } else {
            0.0
        };

        let elapsed = (Utc::now() - self.started_at).num_seconds().max(0) as u64;
        self.elapsed_seconds = elapsed;

        if current > 0 && total > current {
            let rate = elapsed as f64 / current as f64;
            self.estimated_remaining_seconds = Some(((total - current) as f64 * rate) as u64);
        } else {
            self.estimated_remaining_seconds = None;
        }
    }

    /// True once the session reached COMPLETED, FAILED, or CANCELLED
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

impl Default for HarvestSession {
    fn default() -> Self {
        Self::new()
    }
}
