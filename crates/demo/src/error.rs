//! Demo error types.

use event_bus::TransportError;
use metrics_exporter_prometheus::BuildError;
use saga::SagaError;
use thiserror::Error;

/// Errors that stop the demo process.
#[derive(Debug, Error)]
pub enum DemoError {
    /// The Prometheus recorder could not be built.
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] BuildError),

    /// A scenario could not be run.
    #[error("Saga error: {0}")]
    Saga(#[from] SagaError),

    /// The transport could not be closed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Binding or serving the HTTP endpoints failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scenario runner task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience type alias for demo results.
pub type Result<T> = std::result::Result<T, DemoError>;
