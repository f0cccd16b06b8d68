//! In-memory saga participants and their failure policies.
//!
//! Each participant subscribes to its request events on the bus, keeps its
//! own state keyed by order ID and answers with exactly one outcome event per
//! request.

pub mod inventory;
pub mod payment;
pub mod shipping;

use std::collections::HashSet;
use std::sync::Arc;

pub use inventory::InMemoryInventoryService;
pub use payment::InMemoryPaymentService;
pub use shipping::InMemoryShippingService;

/// Decides whether a participant should fail the request for an order.
pub trait FailurePolicy: Send + Sync {
    fn should_fail(&self, order_id: &str) -> bool;
}

/// Policy that accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FailurePolicy for NeverFail {
    fn should_fail(&self, _order_id: &str) -> bool {
        false
    }
}

/// Policy that fails requests for a fixed set of order IDs.
#[derive(Debug, Clone, Default)]
pub struct FailFor {
    order_ids: HashSet<String>,
}

impl FailFor {
    /// Creates a policy that fails only for `order_id`.
    pub fn order(order_id: impl Into<String>) -> Self {
        Self {
            order_ids: HashSet::from([order_id.into()]),
        }
    }

    /// Adds another failing order ID.
    pub fn and(mut self, order_id: impl Into<String>) -> Self {
        self.order_ids.insert(order_id.into());
        self
    }
}

impl<S: Into<String>> FromIterator<S> for FailFor {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            order_ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl FailurePolicy for FailFor {
    fn should_fail(&self, order_id: &str) -> bool {
        self.order_ids.contains(order_id)
    }
}

/// Policy that fails every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFail;

impl FailurePolicy for AlwaysFail {
    fn should_fail(&self, _order_id: &str) -> bool {
        true
    }
}

impl<F> FailurePolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_fail(&self, order_id: &str) -> bool {
        self(order_id)
    }
}

pub(crate) fn never_fail() -> Arc<dyn FailurePolicy> {
    Arc::new(NeverFail)
}
