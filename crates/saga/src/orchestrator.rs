//! Order saga orchestrator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::payloads::{
    CreateShipment, InventoryQuantity, OrderRef, PaymentAmount, ReserveInventory,
    ShipmentCreated, StepFailed,
};
use common::{SagaMetrics, SagaResult, SagaStatus, names, step};
use event_bus::{BusError, Event, EventBus};
use serde::de::DeserializeOwned;

use crate::error::{Result, SagaError};
use crate::state::{CompensationKind, SagaRecord};
use crate::support::{decode, publish, read, write};

/// Input for one order saga.
#[derive(Debug, Clone, PartialEq)]
pub struct SagaRequest {
    pub order_id: String,
    pub quantity: u32,
    pub amount: f64,
    pub address: String,
}

impl SagaRequest {
    pub fn new(
        order_id: impl Into<String>,
        quantity: u32,
        amount: f64,
        address: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            quantity,
            amount,
            address: address.into(),
        }
    }
}

impl From<SagaRequest> for ReserveInventory {
    fn from(request: SagaRequest) -> Self {
        Self {
            order_id: request.order_id,
            quantity: request.quantity,
            amount: request.amount,
            address: request.address,
        }
    }
}

/// Drives order sagas through inventory, payment and shipping.
///
/// The orchestrator reacts to participant outcome events on the bus, moves
/// each saga through its state machine and issues compensations when a later
/// step fails. Nothing is persisted; results live only as long as the
/// orchestrator does.
pub struct OrderSagaOrchestrator {
    bus: EventBus,
    metrics: SagaMetrics,
    sagas: RwLock<HashMap<String, SagaRecord>>,
}

impl OrderSagaOrchestrator {
    /// Creates the orchestrator and subscribes it to every outcome event.
    #[must_use = "dropping the returned Arc unsubscribes the component"]
    pub fn register(bus: &EventBus, metrics: SagaMetrics) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            bus: bus.clone(),
            metrics,
            sagas: RwLock::default(),
        });

        bus.subscribe_weak(names::INVENTORY_RESERVED, &orchestrator, Self::on_inventory_reserved);
        bus.subscribe_weak(
            names::INVENTORY_RESERVE_FAILED,
            &orchestrator,
            Self::on_inventory_failed,
        );
        bus.subscribe_weak(names::PAYMENT_CHARGED, &orchestrator, Self::on_payment_charged);
        bus.subscribe_weak(names::PAYMENT_CHARGE_FAILED, &orchestrator, Self::on_payment_failed);
        bus.subscribe_weak(names::SHIPPING_CREATED, &orchestrator, Self::on_shipping_created);
        bus.subscribe_weak(
            names::SHIPPING_CREATE_FAILED,
            &orchestrator,
            Self::on_shipping_failed,
        );
        bus.subscribe_weak(names::INVENTORY_RELEASED, &orchestrator, Self::on_inventory_released);
        bus.subscribe_weak(names::PAYMENT_REFUNDED, &orchestrator, Self::on_payment_refunded);

        orchestrator
    }

    /// Starts a saga and returns its result once the event cascade settles.
    ///
    /// With the in-process participants the cascade runs to a terminal
    /// status before this returns. A transport failure anywhere in the
    /// cascade is reported as [`SagaError::Bus`] after the cascade has
    /// finished; the saga itself is unaffected and its result stays
    /// available through [`OrderSagaOrchestrator::result`].
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub fn start(&self, saga_id: &str, request: SagaRequest) -> Result<SagaResult> {
        if !request.amount.is_finite() {
            return Err(SagaError::InvalidRequest(format!(
                "amount must be finite, got {}",
                request.amount
            )));
        }
        {
            let mut sagas = write(&self.sagas);
            if sagas.contains_key(saga_id) {
                return Err(SagaError::AlreadyStarted(saga_id.to_string()));
            }
            sagas.insert(saga_id.to_string(), SagaRecord::new(saga_id));
        }
        self.metrics.saga_started();
        tracing::info!("saga started");

        let body = ReserveInventory::from(request);
        let event = Event::with_body(names::INVENTORY_RESERVE_REQUESTED, saga_id, &body)?;
        let published = self.bus.publish(event);

        let (result, elapsed) = {
            let sagas = read(&self.sagas);
            let record = &sagas[saga_id];
            (record.result.clone(), record.started_at.elapsed())
        };
        if !result.status.is_active() {
            self.metrics.saga_finished(result.status, elapsed);
        }
        tracing::info!(
            status = %result.status,
            steps = result.steps.len(),
            compensations = result.compensations.len(),
            "saga settled"
        );

        published?;
        Ok(result)
    }

    /// Returns a snapshot of a saga's result.
    pub fn result(&self, saga_id: &str) -> Option<SagaResult> {
        read(&self.sagas)
            .get(saga_id)
            .map(|record| record.result.clone())
    }

    /// Returns the IDs of every saga started so far, sorted.
    pub fn saga_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.sagas).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of sagas started so far.
    pub fn saga_count(&self) -> usize {
        read(&self.sagas).len()
    }

    fn on_inventory_reserved(&self, event: &Event) -> std::result::Result<(), BusError> {
        let InventoryQuantity { order_id, .. } = decode(event)?;
        let accepted = self.apply(event, |saga| {
            (saga.status() == SagaStatus::Started).then(|| {
                saga.result.status = SagaStatus::InProgress;
                saga.record_step(step::INVENTORY_RESERVED);
            })
        });
        if accepted.is_none() {
            return Ok(());
        }

        let request: ReserveInventory =
            self.source_body(event, names::INVENTORY_RESERVE_REQUESTED)?;
        publish(
            &self.bus,
            names::PAYMENT_CHARGE_REQUESTED,
            &event.saga_id,
            &PaymentAmount {
                order_id,
                amount: request.amount,
            },
        )
    }

    fn on_inventory_failed(&self, event: &Event) -> std::result::Result<(), BusError> {
        let StepFailed { error, .. } = decode(event)?;
        self.apply(event, |saga| {
            (saga.status() == SagaStatus::Started).then(|| saga.fail(step::INVENTORY_FAILED, error))
        });
        Ok(())
    }

    fn on_payment_charged(&self, event: &Event) -> std::result::Result<(), BusError> {
        let PaymentAmount { order_id, .. } = decode(event)?;
        let accepted = self.apply(event, |saga| {
            (saga.status() == SagaStatus::InProgress && !saga.payment_charged).then(|| {
                saga.payment_charged = true;
                saga.record_step(step::PAYMENT_CHARGED);
            })
        });
        if accepted.is_none() {
            return Ok(());
        }

        let request: ReserveInventory =
            self.source_body(event, names::INVENTORY_RESERVE_REQUESTED)?;
        publish(
            &self.bus,
            names::SHIPPING_CREATE_REQUESTED,
            &event.saga_id,
            &CreateShipment {
                order_id,
                address: request.address,
            },
        )
    }

    fn on_payment_failed(&self, event: &Event) -> std::result::Result<(), BusError> {
        let StepFailed { order_id, error } = decode(event)?;
        let failed = self.apply(event, |saga| {
            (saga.status() == SagaStatus::InProgress && !saga.payment_charged)
                .then(|| saga.fail(step::PAYMENT_FAILED, error))
        });
        if failed.is_none() {
            return Ok(());
        }

        self.compensate(&event.saga_id, &order_id, CompensationKind::ReleaseInventory)
    }

    fn on_shipping_created(&self, event: &Event) -> std::result::Result<(), BusError> {
        let ShipmentCreated { tracking_id, .. } = decode(event)?;
        let completed = self.apply(event, |saga| {
            (saga.status() == SagaStatus::InProgress && saga.payment_charged).then(|| {
                saga.result.status = SagaStatus::Completed;
                saga.record_step(step::SHIPPING_CREATED);
                saga.record_step(step::SAGA_COMPLETED);
            })
        });
        if completed.is_some() {
            tracing::info!(saga_id = %event.saga_id, %tracking_id, "saga completed");
        }
        Ok(())
    }

    fn on_shipping_failed(&self, event: &Event) -> std::result::Result<(), BusError> {
        let StepFailed { order_id, error } = decode(event)?;
        let failed = self.apply(event, |saga| {
            (saga.status() == SagaStatus::InProgress && saga.payment_charged)
                .then(|| saga.fail(step::SHIPPING_FAILED, error))
        });
        if failed.is_none() {
            return Ok(());
        }

        // Both requests go out even if forwarding the first one fails.
        let refund = self.compensate(&event.saga_id, &order_id, CompensationKind::RefundPayment);
        let release =
            self.compensate(&event.saga_id, &order_id, CompensationKind::ReleaseInventory);
        refund.and(release)
    }

    fn on_inventory_released(&self, event: &Event) -> std::result::Result<(), BusError> {
        self.confirm(event, CompensationKind::ReleaseInventory);
        Ok(())
    }

    fn on_payment_refunded(&self, event: &Event) -> std::result::Result<(), BusError> {
        self.confirm(event, CompensationKind::RefundPayment);
        Ok(())
    }

    /// Runs `transition` against the saga addressed by `event`.
    ///
    /// Returns `None` when the saga is unknown or the transition rejects the
    /// event in the saga's current state; both cases are logged and ignored.
    fn apply<R>(
        &self,
        event: &Event,
        transition: impl FnOnce(&mut SagaRecord) -> Option<R>,
    ) -> Option<R> {
        let mut sagas = write(&self.sagas);
        let Some(saga) = sagas.get_mut(&event.saga_id) else {
            tracing::warn!(
                event = %event.name,
                saga_id = %event.saga_id,
                "event for unknown saga ignored"
            );
            return None;
        };

        let status = saga.status();
        let applied = transition(saga);
        match &applied {
            Some(_) => tracing::debug!(
                event = %event.name,
                saga_id = %event.saga_id,
                from = %status,
                to = %saga.status(),
                "saga transition"
            ),
            None => tracing::warn!(
                event = %event.name,
                saga_id = %event.saga_id,
                %status,
                "event outside accepted state ignored"
            ),
        }
        applied
    }

    /// Records a compensation request and publishes it to the participant.
    fn compensate(
        &self,
        saga_id: &str,
        order_id: &str,
        kind: CompensationKind,
    ) -> std::result::Result<(), BusError> {
        let issue = write(&self.sagas)
            .get_mut(saga_id)
            .is_some_and(|saga| saga.request_compensation(kind));
        if !issue {
            return Ok(());
        }

        tracing::info!(saga_id, compensation = kind.requested_label(), "compensation requested");
        publish(
            &self.bus,
            kind.request_event(),
            saga_id,
            &OrderRef {
                order_id: order_id.to_string(),
            },
        )
    }

    fn confirm(&self, event: &Event, kind: CompensationKind) {
        let upgraded = self.apply(event, |saga| {
            saga.confirm_compensation(kind)
                .then(|| saga.refresh_failed_compensated())
        });
        if upgraded == Some(true) {
            tracing::info!(saga_id = %event.saga_id, "saga failed and fully compensated");
        }
    }

    /// Decodes the latest `source` event for the saga addressed by `event`.
    ///
    /// # Panics
    ///
    /// Panics if no such event was ever published: a participant outcome
    /// always follows its request, so a miss means the cascade is broken.
    fn source_body<T: DeserializeOwned>(
        &self,
        event: &Event,
        source: &str,
    ) -> std::result::Result<T, BusError> {
        let Some(source_event) = self.bus.latest(source, &event.saga_id) else {
            panic!(
                "no `{source}` event recorded for saga {} while handling `{}`",
                event.saga_id, event.name
            );
        };
        decode(&source_event)
    }
}

impl std::fmt::Debug for OrderSagaOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSagaOrchestrator")
            .field("sagas", &self.saga_count())
            .finish_non_exhaustive()
    }
}
