//! Local transports: a no-op default and an in-memory recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use common::Event;

use super::Transport;
use crate::error::TransportError;

/// Transport used when no external broker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn publish(&self, _event: &Event) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// In-memory transport for testing.
///
/// Keeps the serialized wire envelope of every forwarded event.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    published: Arc<RwLock<Vec<String>>>,
    fail_on_publish: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl InMemoryTransport {
    /// Creates a new in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the transport to reject every publish as unroutable.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::Release);
    }

    /// Returns the wire envelopes forwarded so far.
    pub fn published(&self) -> Vec<String> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decodes the forwarded envelopes back into events.
    pub fn decoded(&self) -> Result<Vec<Event>, serde_json::Error> {
        self.published()
            .iter()
            .map(|body| serde_json::from_str(body))
            .collect()
    }

    /// Returns the number of forwarded events.
    pub fn published_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Transport for InMemoryTransport {
    fn publish(&self, event: &Event) -> Result<(), TransportError> {
        if self.fail_on_publish.load(Ordering::Acquire) {
            return Err(TransportError::Unroutable {
                event: event.name.clone(),
            });
        }

        let body = serde_json::to_string(event)?;
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::names;
    use common::payloads::PaymentAmount;

    #[test]
    fn test_noop_accepts_everything() {
        let transport = NoopTransport;
        transport
            .publish(&Event::new(names::PAYMENT_CHARGED, "SAGA-1"))
            .unwrap();
        transport.close().unwrap();
    }

    #[test]
    fn test_wire_round_trip() {
        let transport = InMemoryTransport::new();
        let event = Event::with_body(
            names::PAYMENT_CHARGED,
            "SAGA-1",
            &PaymentAmount {
                order_id: "ORDER-1".into(),
                amount: 199.9,
            },
        )
        .unwrap();

        transport.publish(&event).unwrap();

        let decoded = transport.decoded().unwrap();
        assert_eq!(decoded, vec![event]);
    }

    #[test]
    fn test_fail_on_publish() {
        let transport = InMemoryTransport::new();
        transport.set_fail_on_publish(true);

        let result = transport.publish(&Event::new(names::SHIPPING_CREATED, "SAGA-1"));
        assert!(matches!(result, Err(TransportError::Unroutable { .. })));
        assert_eq!(transport.published_count(), 0);

        transport.set_fail_on_publish(false);
        transport
            .publish(&Event::new(names::SHIPPING_CREATED, "SAGA-1"))
            .unwrap();
        assert_eq!(transport.published_count(), 1);
    }

    #[test]
    fn test_close_marks_closed() {
        let transport = InMemoryTransport::new();
        assert!(!transport.is_closed());
        transport.close().unwrap();
        assert!(transport.is_closed());
    }
}
