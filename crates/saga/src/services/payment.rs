//! In-memory payment participant.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::names;
use common::payloads::{OrderRef, PaymentAmount, StepFailed};
use event_bus::{BusError, Event, EventBus};

use super::FailurePolicy;
use crate::support::{decode, publish, read, write};

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: HashMap<String, f64>,
}

/// In-memory payment service.
///
/// Answers `payment.charge.requested` with `payment.charged` or
/// `payment.charge.failed`, and `payment.refund.requested` with
/// `payment.refunded`.
pub struct InMemoryPaymentService {
    bus: EventBus,
    failure: Arc<dyn FailurePolicy>,
    state: RwLock<InMemoryPaymentState>,
}

impl InMemoryPaymentService {
    /// Creates the service and subscribes it to its request events.
    #[must_use = "dropping the returned Arc unsubscribes the component"]
    pub fn register(bus: &EventBus, failure: Arc<dyn FailurePolicy>) -> Arc<Self> {
        let service = Arc::new(Self {
            bus: bus.clone(),
            failure,
            state: RwLock::default(),
        });
        bus.subscribe_weak(names::PAYMENT_CHARGE_REQUESTED, &service, Self::charge);
        bus.subscribe_weak(names::PAYMENT_REFUND_REQUESTED, &service, Self::refund);
        service
    }

    /// Returns the number of orders with an outstanding charge.
    pub fn charge_count(&self) -> usize {
        read(&self.state).charges.len()
    }

    /// Returns the amount charged for an order, if any.
    pub fn charged_amount(&self, order_id: &str) -> Option<f64> {
        read(&self.state).charges.get(order_id).copied()
    }

    #[tracing::instrument(skip_all, fields(saga_id = %event.saga_id))]
    fn charge(&self, event: &Event) -> Result<(), BusError> {
        let PaymentAmount { order_id, amount } = decode(event)?;

        if self.failure.should_fail(&order_id) {
            let error = format!("card declined for order {order_id}");
            tracing::warn!(%order_id, %error, "payment rejected");
            return publish(
                &self.bus,
                names::PAYMENT_CHARGE_FAILED,
                &event.saga_id,
                &StepFailed { order_id, error },
            );
        }

        write(&self.state).charges.insert(order_id.clone(), amount);
        tracing::debug!(%order_id, amount, "payment charged");

        publish(
            &self.bus,
            names::PAYMENT_CHARGED,
            &event.saga_id,
            &PaymentAmount { order_id, amount },
        )
    }

    #[tracing::instrument(skip_all, fields(saga_id = %event.saga_id))]
    fn refund(&self, event: &Event) -> Result<(), BusError> {
        let OrderRef { order_id } = decode(event)?;
        let amount = write(&self.state)
            .charges
            .remove(&order_id)
            .unwrap_or_default();
        tracing::debug!(%order_id, amount, "payment refunded");

        publish(
            &self.bus,
            names::PAYMENT_REFUNDED,
            &event.saga_id,
            &PaymentAmount { order_id, amount },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{AlwaysFail, NeverFail};

    fn charge_event(saga_id: &str, order_id: &str, amount: f64) -> Event {
        Event::with_body(
            names::PAYMENT_CHARGE_REQUESTED,
            saga_id,
            &PaymentAmount {
                order_id: order_id.into(),
                amount,
            },
        )
        .unwrap()
    }

    fn refund_event(saga_id: &str, order_id: &str) -> Event {
        Event::with_body(
            names::PAYMENT_REFUND_REQUESTED,
            saga_id,
            &OrderRef {
                order_id: order_id.into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_charge_and_refund() {
        let bus = EventBus::new();
        let service = InMemoryPaymentService::register(&bus, Arc::new(NeverFail));

        bus.publish(charge_event("SAGA-1", "ORDER-1", 199.9)).unwrap();
        assert_eq!(service.charge_count(), 1);
        assert_eq!(service.charged_amount("ORDER-1"), Some(199.9));

        bus.publish(refund_event("SAGA-1", "ORDER-1")).unwrap();
        assert_eq!(service.charge_count(), 0);

        let refunded = bus.latest(names::PAYMENT_REFUNDED, "SAGA-1").unwrap();
        let body: PaymentAmount = refunded.body().unwrap();
        assert_eq!(body.order_id, "ORDER-1");
        assert_eq!(body.amount, 199.9);
    }

    #[test]
    fn test_refund_unknown_order_reports_zero() {
        let bus = EventBus::new();
        let _service = InMemoryPaymentService::register(&bus, Arc::new(NeverFail));

        bus.publish(refund_event("SAGA-1", "ORDER-UNKNOWN")).unwrap();

        let refunded = bus.latest(names::PAYMENT_REFUNDED, "SAGA-1").unwrap();
        let body: PaymentAmount = refunded.body().unwrap();
        assert_eq!(body.amount, 0.0);
    }

    #[test]
    fn test_repeat_charge_replaces_amount() {
        let bus = EventBus::new();
        let service = InMemoryPaymentService::register(&bus, Arc::new(NeverFail));

        bus.publish(charge_event("SAGA-1", "ORDER-1", 50.0)).unwrap();
        bus.publish(charge_event("SAGA-2", "ORDER-1", 80.0)).unwrap();
        assert_eq!(service.charge_count(), 1);
        assert_eq!(service.charged_amount("ORDER-1"), Some(80.0));

        bus.publish(refund_event("SAGA-2", "ORDER-1")).unwrap();
        let refunded = bus.latest(names::PAYMENT_REFUNDED, "SAGA-2").unwrap();
        let body: PaymentAmount = refunded.body().unwrap();
        assert_eq!(body.amount, 80.0);
    }

    #[test]
    fn test_declined_charge() {
        let bus = EventBus::new();
        let service = InMemoryPaymentService::register(&bus, Arc::new(AlwaysFail));

        bus.publish(charge_event("SAGA-1", "ORDER-1", 50.0)).unwrap();

        assert_eq!(service.charge_count(), 0);
        let failed = bus.latest(names::PAYMENT_CHARGE_FAILED, "SAGA-1").unwrap();
        let body: StepFailed = failed.body().unwrap();
        assert_eq!(body.order_id, "ORDER-1");
        assert_eq!(body.error, "card declined for order ORDER-1");
    }
}
