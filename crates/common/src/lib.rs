//! Shared types for the order saga.
//!
//! This crate holds the pieces that both the event bus and the saga
//! orchestrator consume: the [`Event`] envelope, the typed payload bodies
//! exchanged between the orchestrator and the participants, the
//! [`SagaResult`] record and the [`SagaMetrics`] facade.

pub mod event;
pub mod metrics;
pub mod payloads;
pub mod result;

pub use event::{Event, Payload, names};
pub use metrics::SagaMetrics;
pub use result::{SagaResult, SagaStatus, compensation, step};
