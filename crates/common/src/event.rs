use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Ordered mapping of payload keys to loosely typed values.
pub type Payload = serde_json::Map<String, Value>;

/// Names of the events exchanged during an order saga.
pub mod names {
    pub const INVENTORY_RESERVE_REQUESTED: &str = "inventory.reserve.requested";
    pub const INVENTORY_RESERVED: &str = "inventory.reserved";
    pub const INVENTORY_RESERVE_FAILED: &str = "inventory.reserve.failed";
    pub const INVENTORY_RELEASE_REQUESTED: &str = "inventory.release.requested";
    pub const INVENTORY_RELEASED: &str = "inventory.released";

    pub const PAYMENT_CHARGE_REQUESTED: &str = "payment.charge.requested";
    pub const PAYMENT_CHARGED: &str = "payment.charged";
    pub const PAYMENT_CHARGE_FAILED: &str = "payment.charge.failed";
    pub const PAYMENT_REFUND_REQUESTED: &str = "payment.refund.requested";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";

    pub const SHIPPING_CREATE_REQUESTED: &str = "shipping.create.requested";
    pub const SHIPPING_CREATED: &str = "shipping.created";
    pub const SHIPPING_CREATE_FAILED: &str = "shipping.create.failed";
}

/// A named domain event belonging to one saga.
///
/// This is also the wire envelope mirrored to external transports:
/// `{"name": ..., "saga_id": ..., "payload": {...}}`. A missing or `null`
/// payload decodes to an empty map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event name, e.g. `"inventory.reserved"`.
    pub name: String,

    /// The saga this event belongs to.
    pub saga_id: String,

    /// Event data. The schema is implied by the event name.
    #[serde(default, deserialize_with = "payload_or_empty")]
    pub payload: Payload,
}

impl Event {
    /// Creates an event with an empty payload.
    pub fn new(name: impl Into<String>, saga_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            saga_id: saga_id.into(),
            payload: Payload::new(),
        }
    }

    /// Creates an event whose payload is the serialized form of `body`.
    ///
    /// `body` must serialize to a JSON object (or to `null`, which yields an
    /// empty payload).
    pub fn with_body<T: Serialize>(
        name: impl Into<String>,
        saga_id: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = match serde_json::to_value(body)? {
            Value::Object(map) => map,
            Value::Null => Payload::new(),
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "event payload must be a JSON object, got {other}"
                )));
            }
        };

        Ok(Self {
            name: name.into(),
            saga_id: saga_id.into(),
            payload,
        })
    }

    /// Decodes the payload into a typed body.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.payload.clone()))
    }

    /// Returns true if this event has the given name and saga ID.
    pub fn matches(&self, name: &str, saga_id: &str) -> bool {
        self.name == name && self.saga_id == saga_id
    }
}

fn payload_or_empty<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}
