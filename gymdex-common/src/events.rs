//! Event types for the gymdex event system
//!
//! Provides shared event definitions and the EventBus used by the harvest
//! engine to report progress to whoever is listening (UI, logs, tests).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Harvest lifecycle and progress events
///
/// Events are broadcast via EventBus and serialize with a `type` tag so
/// external consumers can filter without exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEvent {
    /// A harvest run started
    HarvestStarted {
        /// Session UUID for this run
        session_id: Uuid,
        /// Number of targets scheduled
        total_targets: usize,
        /// When the run started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A run phase began (search, fusion)
    PhaseStarted {
        /// Session UUID
        session_id: Uuid,
        /// Phase name
        phase: String,
        /// When the phase started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One scheduler batch finished
    BatchCompleted {
        /// Session UUID
        session_id: Uuid,
        /// 0-based batch index
        batch_index: usize,
        /// Total batches planned at current batch size
        batch_count: usize,
        /// Items succeeded in this batch
        succeeded: usize,
        /// Items attempted in this batch
        attempted: usize,
        /// When the batch completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress update across the whole target list
    ProgressUpdated {
        /// Session UUID
        session_id: Uuid,
        /// Targets processed so far
        current: usize,
        /// Total targets
        total: usize,
        /// Progress percentage (0.0-100.0)
        percentage: f32,
        /// Elapsed time in seconds
        elapsed_seconds: u64,
        /// Estimated remaining time in seconds (if available)
        estimated_remaining_seconds: Option<u64>,
        /// When progress was updated
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A source answered with a block signal (HTTP 403)
    SourceBlocked {
        /// Session UUID
        session_id: Uuid,
        /// Adapter name that was blocked
        source: String,
        /// Cooldown applied before moving on, in milliseconds
        cooldown_ms: u64,
        /// When the block was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A harvest run completed successfully
    HarvestCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Records in the fused output
        total_records: usize,
        /// Baseline records merged with crawled observations
        merged: usize,
        /// Overall output quality score (0.0-1.0)
        quality_score: f32,
        /// Run duration in seconds
        duration_seconds: u64,
        /// When the run completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A harvest run failed outright
    HarvestFailed {
        /// Session UUID
        session_id: Uuid,
        /// Error message details
        error_message: String,
        /// When the run failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A harvest run was cancelled
    HarvestCancelled {
        /// Session UUID
        session_id: Uuid,
        /// Targets processed before cancellation
        targets_processed: usize,
        /// When the run was cancelled
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl HarvestEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            HarvestEvent::HarvestStarted { .. } => "HarvestStarted",
            HarvestEvent::PhaseStarted { .. } => "PhaseStarted",
            HarvestEvent::BatchCompleted { .. } => "BatchCompleted",
            HarvestEvent::ProgressUpdated { .. } => "ProgressUpdated",
            HarvestEvent::SourceBlocked { .. } => "SourceBlocked",
            HarvestEvent::HarvestCompleted { .. } => "HarvestCompleted",
            HarvestEvent::HarvestFailed { .. } => "HarvestFailed",
            HarvestEvent::HarvestCancelled { .. } => "HarvestCancelled",
        }
    }
}

/// Central event distribution bus for harvest events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use gymdex_common::events::{EventBus, HarvestEvent};
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// let event_bus = Arc::new(EventBus::new(100));
///
/// // Subscribe to events
/// let mut rx = event_bus.subscribe();
///
/// // Emit an event
/// event_bus.emit(HarvestEvent::PhaseStarted {
///     session_id: Uuid::new_v4(),
///     phase: "search".to_string(),
///     timestamp: chrono::Utc::now(),
/// }).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HarvestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// `capacity` is how many events the channel buffers before dropping old
    /// events for lagged subscribers. 100 is plenty for a single harvest run;
    /// tests typically use 10.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<HarvestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: HarvestEvent,
    ) -> Result<usize, broadcast::error::SendError<HarvestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress updates use this: it is acceptable for nobody to be watching.
    pub fn emit_lossy(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit() {
        use std::sync::Arc;
        let bus = Arc::new(EventBus::new(10));
        let mut rx = bus.subscribe();

        let event = HarvestEvent::PhaseStarted {
            session_id: Uuid::new_v4(),
            phase: "search".to_string(),
            timestamp: chrono::Utc::now(),
        };

        bus.emit(event).expect("emit should succeed");

        let received = rx.try_recv().expect("should receive event");
        assert_eq!(received.event_type(), "PhaseStarted");
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        use std::sync::Arc;
        let bus = Arc::new(EventBus::new(2));
        let mut _rx = bus.subscribe(); // subscribe but never receive

        for i in 0..10 {
            bus.emit_lossy(HarvestEvent::ProgressUpdated {
                session_id: Uuid::new_v4(),
                current: i,
                total: 10,
                percentage: i as f32 * 10.0,
                elapsed_seconds: i as u64,
                estimated_remaining_seconds: None,
                timestamp: chrono::Utc::now(),
            });
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_multiple_subscribers_receive_same_event() {
        use std::sync::Arc;
        let bus = Arc::new(EventBus::new(10));
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(HarvestEvent::HarvestStarted {
            session_id: Uuid::new_v4(),
            total_targets: 42,
            timestamp: chrono::Utc::now(),
        })
        .expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "HarvestStarted");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "HarvestStarted");
    }

    #[test]
    fn test_event_serialization_tags_type() {
        let event = HarvestEvent::SourceBlocked {
            session_id: Uuid::new_v4(),
            source: "naver".to_string(),
            cooldown_ms: 30_000,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SourceBlocked\""));
        assert!(json.contains("\"source\":\"naver\""));

        let back: HarvestEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "SourceBlocked");
    }
}
