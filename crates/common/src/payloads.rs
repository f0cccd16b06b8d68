//! Typed payload bodies for the order saga events.
//!
//! The orchestrator and the participants agree on one body per event name
//! (see [`crate::names`]). Bodies are carried in [`crate::Event::payload`]
//! as plain JSON objects.

use serde::{Deserialize, Serialize};

/// `inventory.reserve.requested`, the saga's opening request.
///
/// Carries everything later steps look up again (amount, address).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveInventory {
    pub order_id: String,
    pub quantity: u32,
    pub amount: f64,
    pub address: String,
}

/// `inventory.reserved` / `inventory.released`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryQuantity {
    pub order_id: String,
    pub quantity: u32,
}

/// `payment.charge.requested` / `payment.charged` / `payment.refunded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAmount {
    pub order_id: String,
    pub amount: f64,
}

/// `shipping.create.requested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipment {
    pub order_id: String,
    pub address: String,
}

/// `shipping.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub order_id: String,
    pub tracking_id: String,
}

/// Body of every `*.failed` outcome event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailed {
    pub order_id: String,
    pub error: String,
}

/// Body of compensation requests (`inventory.release.requested`,
/// `payment.refund.requested`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRef {
    pub order_id: String,
}
