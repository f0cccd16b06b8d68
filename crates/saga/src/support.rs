//! Helpers shared by the orchestrator and the participants.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use common::Event;
use event_bus::{BusError, EventBus};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Decodes the typed body of an incoming event.
pub(crate) fn decode<T: DeserializeOwned>(event: &Event) -> Result<T, BusError> {
    event.body().map_err(|e| BusError::payload(event, e))
}

/// Publishes `body` as the payload of a new event.
pub(crate) fn publish<T: Serialize>(
    bus: &EventBus,
    name: &str,
    saga_id: &str,
    body: &T,
) -> Result<(), BusError> {
    let event = Event::with_body(name, saga_id, body).map_err(|source| BusError::Payload {
        event: name.to_string(),
        saga_id: saga_id.to_string(),
        source,
    })?;
    bus.publish(event)
}

// Locks are never held while publishing, so a poisoned lock only records a
// panic that happened elsewhere.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
