//! Saga error types.

use event_bus::BusError;
use thiserror::Error;

/// Errors that can occur during saga operations.
///
/// Participant failures are not errors: they are outcome events recorded in
/// the saga's own result.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A saga with this ID has already been started.
    #[error("Saga has already been started: {0}")]
    AlreadyStarted(String),

    /// The request cannot be carried in an event payload.
    #[error("Invalid saga request: {0}")]
    InvalidRequest(String),

    /// Publishing failed. The in-process cascade had already completed.
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
