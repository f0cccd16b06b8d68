//! Order saga orchestration over the in-process event bus.
//!
//! An order saga reserves inventory, charges payment and creates a shipment.
//! Each step is a request/outcome event exchange between the
//! [`OrderSagaOrchestrator`] and one participant service. When a later step
//! fails, the orchestrator issues compensating requests for the earlier
//! steps and marks the saga `FAILED_COMPENSATED` once every one of them is
//! confirmed.

pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod services;
pub mod state;

mod support;

pub use error::{Result, SagaError};
pub use orchestrator::{OrderSagaOrchestrator, SagaRequest};
pub use runtime::{SagaRuntime, SagaRuntimeBuilder};
pub use services::{
    AlwaysFail, FailFor, FailurePolicy, InMemoryInventoryService, InMemoryPaymentService,
    InMemoryShippingService, NeverFail,
};
pub use state::{CompensationKind, CompensationProgress};
