//! In-process event bus for saga events.
//!
//! The [`EventBus`] delivers named [`Event`]s synchronously to subscribed
//! handlers, keeps an ordered history of everything published, and mirrors
//! each event to a [`Transport`] once local delivery has finished.

pub mod bus;
pub mod error;
pub mod transport;

pub use bus::{EventBus, Handler};
pub use common::Event;
pub use error::{BusError, Result, TransportError};
pub use transport::{
    InMemoryTransport, NoopTransport, RabbitMqConfig, RabbitMqTransport, Transport,
};
