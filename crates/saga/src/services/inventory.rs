//! In-memory inventory participant.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::names;
use common::payloads::{InventoryQuantity, OrderRef, ReserveInventory, StepFailed};
use event_bus::{BusError, Event, EventBus};

use super::FailurePolicy;
use crate::support::{decode, publish, read, write};

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    reservations: HashMap<String, u32>,
}

/// In-memory inventory service.
///
/// Answers `inventory.reserve.requested` with `inventory.reserved` or
/// `inventory.reserve.failed`, and `inventory.release.requested` with
/// `inventory.released`.
pub struct InMemoryInventoryService {
    bus: EventBus,
    failure: Arc<dyn FailurePolicy>,
    state: RwLock<InMemoryInventoryState>,
}

impl InMemoryInventoryService {
    /// Creates the service and subscribes it to its request events.
    #[must_use = "dropping the returned Arc unsubscribes the component"]
    pub fn register(bus: &EventBus, failure: Arc<dyn FailurePolicy>) -> Arc<Self> {
        let service = Arc::new(Self {
            bus: bus.clone(),
            failure,
            state: RwLock::default(),
        });
        bus.subscribe_weak(names::INVENTORY_RESERVE_REQUESTED, &service, Self::reserve);
        bus.subscribe_weak(names::INVENTORY_RELEASE_REQUESTED, &service, Self::release);
        service
    }

    /// Returns the number of orders with reserved stock.
    pub fn reservation_count(&self) -> usize {
        read(&self.state).reservations.len()
    }

    /// Returns the quantity reserved for an order, if any.
    pub fn reserved_quantity(&self, order_id: &str) -> Option<u32> {
        read(&self.state).reservations.get(order_id).copied()
    }

    #[tracing::instrument(skip_all, fields(saga_id = %event.saga_id))]
    fn reserve(&self, event: &Event) -> Result<(), BusError> {
        let ReserveInventory {
            order_id, quantity, ..
        } = decode(event)?;

        if self.failure.should_fail(&order_id) {
            let error = format!("insufficient stock for order {order_id}");
            tracing::warn!(%order_id, %error, "inventory reservation rejected");
            return publish(
                &self.bus,
                names::INVENTORY_RESERVE_FAILED,
                &event.saga_id,
                &StepFailed { order_id, error },
            );
        }

        *write(&self.state)
            .reservations
            .entry(order_id.clone())
            .or_default() += quantity;
        tracing::debug!(%order_id, quantity, "inventory reserved");

        publish(
            &self.bus,
            names::INVENTORY_RESERVED,
            &event.saga_id,
            &InventoryQuantity { order_id, quantity },
        )
    }

    #[tracing::instrument(skip_all, fields(saga_id = %event.saga_id))]
    fn release(&self, event: &Event) -> Result<(), BusError> {
        let OrderRef { order_id } = decode(event)?;
        let quantity = write(&self.state)
            .reservations
            .remove(&order_id)
            .unwrap_or_default();
        tracing::debug!(%order_id, quantity, "inventory released");

        publish(
            &self.bus,
            names::INVENTORY_RELEASED,
            &event.saga_id,
            &InventoryQuantity { order_id, quantity },
        )
    }
}
