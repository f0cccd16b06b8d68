//! Synchronous publish/subscribe hub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use common::{Event, SagaMetrics};

use crate::error::{BusError, Result, TransportError};
use crate::transport::{NoopTransport, Transport};

/// A subscriber callback.
///
/// Handlers may publish further events on the same bus; dispatch is
/// recursive and completes before the outer `publish` returns.
pub type Handler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// In-process event bus with an ordered history and a mirroring transport.
///
/// Cloning is cheap and every clone shares the same handlers, history and
/// transport.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
    history: Arc<RwLock<Vec<Event>>>,
    transport: Arc<dyn Transport>,
    metrics: SagaMetrics,
    closed: Arc<AtomicBool>,
}

impl EventBus {
    /// Creates a bus that mirrors nothing and records no metrics.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(NoopTransport))
    }

    /// Creates a bus that forwards every event to `transport`.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            handlers: Arc::default(),
            history: Arc::default(),
            transport,
            metrics: SagaMetrics::disabled(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the metrics sink used to count published events.
    pub fn with_metrics(mut self, metrics: SagaMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Registers `handler` for every future event named `event_name`.
    ///
    /// Handlers for the same name run in registration order.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let event_name = event_name.into();
        tracing::debug!(event = %event_name, "handler subscribed");
        write(&self.handlers)
            .entry(event_name)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Registers a method of a shared component as a handler.
    ///
    /// Only a weak reference to `target` is kept, so the bus never keeps a
    /// component alive. Events arriving after `target` was dropped are
    /// ignored.
    pub fn subscribe_weak<T, F>(&self, event_name: impl Into<String>, target: &Arc<T>, method: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &Event) -> Result<()> + Send + Sync + 'static,
    {
        let target = Arc::downgrade(target);
        self.subscribe(event_name, move |event: &Event| match target.upgrade() {
            Some(target) => method(&target, event),
            None => Ok(()),
        });
    }

    /// Publishes an event.
    ///
    /// The event is appended to the history, then every handler registered
    /// for its name runs (on a snapshot of the handler list), then the event
    /// is forwarded to the transport. All handlers run even if one fails.
    /// The first handler error is returned, otherwise the transport outcome.
    /// Local effects are never rolled back.
    pub fn publish(&self, event: Event) -> Result<()> {
        write(&self.history).push(event.clone());
        let handlers: Vec<Handler> = read(&self.handlers)
            .get(&event.name)
            .cloned()
            .unwrap_or_default();

        self.metrics.event_published(&event.name);
        tracing::info!(
            event = %event.name,
            saga_id = %event.saga_id,
            payload = ?event.payload,
            handler_count = handlers.len(),
            "event published"
        );

        let mut first_error = None;
        for handler in &handlers {
            if let Err(err) = handler(&event) {
                tracing::warn!(
                    event = %event.name,
                    saga_id = %event.saga_id,
                    error = %err,
                    "event handler failed"
                );
                first_error.get_or_insert(err);
            }
        }

        let forwarded = self.forward(&event);
        match first_error {
            Some(err) => Err(err),
            None => forwarded,
        }
    }

    fn forward(&self, event: &Event) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(event = %event.name, "bus closed, event not forwarded");
            return Ok(());
        }

        self.transport.publish(event).map_err(|err| {
            tracing::error!(
                event = %event.name,
                saga_id = %event.saga_id,
                error = %err,
                "transport publish failed"
            );
            BusError::Transport(err)
        })
    }

    /// Returns a copy of every event published so far, oldest first.
    pub fn history(&self) -> Vec<Event> {
        read(&self.history).clone()
    }

    /// Returns the events published for one saga, oldest first.
    pub fn history_for(&self, saga_id: &str) -> Vec<Event> {
        read(&self.history)
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .cloned()
            .collect()
    }

    /// Returns the most recent event named `name` for `saga_id`.
    pub fn latest(&self, name: &str, saga_id: &str) -> Option<Event> {
        read(&self.history)
            .iter()
            .rev()
            .find(|e| e.matches(name, saga_id))
            .cloned()
    }

    /// Returns the total number of events published.
    pub fn event_count(&self) -> usize {
        read(&self.history).len()
    }

    /// Closes the transport. Only the first call reaches the transport.
    ///
    /// Events published afterwards are still delivered in-process but no
    /// longer forwarded.
    pub fn close(&self) -> std::result::Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!("closing event bus transport");
        self.transport.close()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_count", &self.event_count())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// Handlers never run while a lock is held, so a poisoned lock only means a
// panic elsewhere; the data itself is still consistent.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
