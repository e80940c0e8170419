//! Error types for the harvest service layer

use thiserror::Error;

/// Service-level error type
///
/// Per-item failures never surface here; they are swallowed into fallback
/// stubs and error records so the batch loop keeps going. Only conditions
/// that invalidate the whole call are errors at this level.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A harvest run is already in progress; runs never interleave
    #[error("Harvest already running: {0}")]
    AlreadyRunning(String),

    /// The run was cancelled before producing a result
    #[error("Harvest cancelled: {0}")]
    Cancelled(String),

    /// Backing store failure on read or write
    #[error("Store error: {0}")]
    Store(#[from] gymdex_common::Error),

    /// Configuration problem detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for service entry points
pub type ServiceResult<T> = Result<T, ServiceError>;
