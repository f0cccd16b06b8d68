//! Transports mirror published events to the outside world.

pub mod memory;
pub mod rabbitmq;

use common::Event;

use crate::error::TransportError;

pub use memory::{InMemoryTransport, NoopTransport};
pub use rabbitmq::{RabbitMqConfig, RabbitMqTransport};

/// Destination for events after in-process delivery.
///
/// Calls are blocking: the bus forwards from inside the synchronous
/// dispatch chain.
pub trait Transport: Send + Sync {
    /// Forwards one event.
    fn publish(&self, event: &Event) -> Result<(), TransportError>;

    /// Releases any resources held by the transport.
    fn close(&self) -> Result<(), TransportError>;
}
