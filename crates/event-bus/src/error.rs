use common::Event;
use thiserror::Error;

/// Errors raised while mirroring events to an external transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was configured with missing or malformed settings.
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP request could not be sent or its response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The broker answered with a non-success status code.
    #[error("{context} failed with status {status}")]
    Status { context: &'static str, status: u16 },

    /// The broker accepted the message but no queue was bound to receive it.
    #[error("Event '{event}' was not routed by the broker")]
    Unroutable { event: String },

    /// The event envelope could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned from [`crate::EventBus::publish`] and from handlers.
#[derive(Debug, Error)]
pub enum BusError {
    /// Forwarding an event to the transport failed.
    ///
    /// In-process delivery had already completed when this happened.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A handler received an event whose payload does not match the schema
    /// implied by its name.
    #[error("Invalid payload for event '{event}' (saga {saga_id}): {source}")]
    Payload {
        event: String,
        saga_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BusError {
    /// Builds a payload error for `event`.
    pub fn payload(event: &Event, source: serde_json::Error) -> Self {
        BusError::Payload {
            event: event.name.clone(),
            saga_id: event.saga_id.clone(),
            source,
        }
    }
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
