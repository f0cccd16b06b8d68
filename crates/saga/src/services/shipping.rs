//! In-memory shipping participant.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::names;
use common::payloads::{CreateShipment, ShipmentCreated, StepFailed};
use event_bus::{BusError, Event, EventBus};

use super::FailurePolicy;
use crate::support::{decode, publish, read, write};

/// In-memory shipping service.
///
/// Answers `shipping.create.requested` with `shipping.created` or
/// `shipping.create.failed`. Shipments are never cancelled.
pub struct InMemoryShippingService {
    bus: EventBus,
    failure: Arc<dyn FailurePolicy>,
    shipments: RwLock<HashMap<String, String>>,
}

impl InMemoryShippingService {
    /// Creates the service and subscribes it to its request events.
    #[must_use = "dropping the returned Arc unsubscribes the component"]
    pub fn register(bus: &EventBus, failure: Arc<dyn FailurePolicy>) -> Arc<Self> {
        let service = Arc::new(Self {
            bus: bus.clone(),
            failure,
            shipments: RwLock::default(),
        });
        bus.subscribe_weak(names::SHIPPING_CREATE_REQUESTED, &service, Self::create);
        service
    }

    /// Returns the number of shipments created.
    pub fn shipment_count(&self) -> usize {
        read(&self.shipments).len()
    }

    /// Returns the tracking ID assigned to an order, if shipped.
    pub fn tracking_id(&self, order_id: &str) -> Option<String> {
        read(&self.shipments).get(order_id).cloned()
    }

    #[tracing::instrument(skip_all, fields(saga_id = %event.saga_id))]
    fn create(&self, event: &Event) -> Result<(), BusError> {
        let CreateShipment { order_id, address } = decode(event)?;

        if self.failure.should_fail(&order_id) {
            let error = format!("shipping unavailable for order {order_id}");
            tracing::warn!(%order_id, %error, "shipment rejected");
            return publish(
                &self.bus,
                names::SHIPPING_CREATE_FAILED,
                &event.saga_id,
                &StepFailed { order_id, error },
            );
        }

        let tracking_id = format!("TRK-{order_id}");
        write(&self.shipments).insert(order_id.clone(), tracking_id.clone());
        tracing::debug!(%order_id, %tracking_id, %address, "shipment created");

        publish(
            &self.bus,
            names::SHIPPING_CREATED,
            &event.saga_id,
            &ShipmentCreated {
                order_id,
                tracking_id,
            },
        )
    }
}
