//! Wiring of a bus, the three participants and the orchestrator.

use std::sync::Arc;

use common::{SagaMetrics, SagaResult};
use event_bus::{EventBus, NoopTransport, Transport};

use crate::error::Result;
use crate::orchestrator::{OrderSagaOrchestrator, SagaRequest};
use crate::services::{
    FailurePolicy, InMemoryInventoryService, InMemoryPaymentService, InMemoryShippingService,
    never_fail,
};

/// A bus with every saga component subscribed to it.
pub struct SagaRuntime {
    bus: EventBus,
    orchestrator: Arc<OrderSagaOrchestrator>,
    inventory: Arc<InMemoryInventoryService>,
    payment: Arc<InMemoryPaymentService>,
    shipping: Arc<InMemoryShippingService>,
}

impl SagaRuntime {
    /// Creates a runtime with no transport, no metrics and no failures.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SagaRuntimeBuilder {
        SagaRuntimeBuilder::default()
    }

    /// Starts a saga. See [`OrderSagaOrchestrator::start`].
    pub fn start(&self, saga_id: &str, request: SagaRequest) -> Result<SagaResult> {
        self.orchestrator.start(saga_id, request)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn orchestrator(&self) -> &OrderSagaOrchestrator {
        &self.orchestrator
    }

    pub fn inventory(&self) -> &InMemoryInventoryService {
        &self.inventory
    }

    pub fn payment(&self) -> &InMemoryPaymentService {
        &self.payment
    }

    pub fn shipping(&self) -> &InMemoryShippingService {
        &self.shipping
    }
}

impl std::fmt::Debug for SagaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaRuntime")
            .field("bus", &self.bus)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Default for SagaRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`SagaRuntime`].
pub struct SagaRuntimeBuilder {
    transport: Arc<dyn Transport>,
    metrics: SagaMetrics,
    inventory_failure: Arc<dyn FailurePolicy>,
    payment_failure: Arc<dyn FailurePolicy>,
    shipping_failure: Arc<dyn FailurePolicy>,
}

impl Default for SagaRuntimeBuilder {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopTransport),
            metrics: SagaMetrics::disabled(),
            inventory_failure: never_fail(),
            payment_failure: never_fail(),
            shipping_failure: never_fail(),
        }
    }
}

impl SagaRuntimeBuilder {
    /// Forwards every published event to `transport`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Records bus and saga metrics through `metrics`.
    pub fn metrics(mut self, metrics: SagaMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn inventory_failure(mut self, policy: impl FailurePolicy + 'static) -> Self {
        self.inventory_failure = Arc::new(policy);
        self
    }

    pub fn payment_failure(mut self, policy: impl FailurePolicy + 'static) -> Self {
        self.payment_failure = Arc::new(policy);
        self
    }

    pub fn shipping_failure(mut self, policy: impl FailurePolicy + 'static) -> Self {
        self.shipping_failure = Arc::new(policy);
        self
    }

    pub fn build(self) -> SagaRuntime {
        let bus = EventBus::with_transport(self.transport).with_metrics(self.metrics.clone());
        let inventory = InMemoryInventoryService::register(&bus, self.inventory_failure);
        let payment = InMemoryPaymentService::register(&bus, self.payment_failure);
        let shipping = InMemoryShippingService::register(&bus, self.shipping_failure);
        let orchestrator = OrderSagaOrchestrator::register(&bus, self.metrics);

        SagaRuntime {
            bus,
            orchestrator,
            inventory,
            payment,
            shipping,
        }
    }
}
