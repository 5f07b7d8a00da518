use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::payment::{PaymentIntent, PaymentStatus};
use super::shipment::{Shipment, ShipmentStatus};

pub const PAYMENT_CREATED: &str = "payment.created";
pub const PAYMENT_AUTHORIZED: &str = "payment.authorized";
pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const PAYMENT_CANCELLED: &str = "payment.cancelled";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const PAYMENT_REFUNDED: &str = "payment.refunded";
pub const PAYMENT_EXPIRED: &str = "payment.expired";
pub const THREE_DS_AUTHENTICATED: &str = "3ds.authenticated";
pub const THREE_DS_FAILED: &str = "3ds.failed";

/// Who caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    #[serde(rename = "API")]
    Api,
    Webhook,
    #[serde(rename = "3DSecure")]
    ThreeDSecure,
    Admin,
    System,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Api => "API",
            Self::Webhook => "Webhook",
            Self::ThreeDSecure => "3DSecure",
            Self::Admin => "Admin",
            Self::System => "System",
        })
    }
}

/// Immutable ledger entry for a payment intent. `status` is the status
/// *after* the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: Uuid,
    pub payment_intent_id: Uuid,
    pub status: PaymentStatus,
    pub event_type: String,
    pub payload: Option<Value>,
    pub source: EventSource,
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    /// Records `intent` in its current status.
    pub fn new(
        intent: &PaymentIntent,
        event_type: impl Into<String>,
        payload: Option<Value>,
        source: EventSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_intent_id: intent.id,
            status: intent.status,
            event_type: event_type.into(),
            payload,
            source,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: ShipmentStatus,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl ShipmentEvent {
    pub fn new(shipment: &Shipment, payload: Option<Value>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            shipment_id: shipment.id,
            status: shipment.status,
            payload,
            created_at: now,
        }
    }
}
