//! JSON views of the domain types. Field names are camelCase on the wire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::event::{EventSource, PaymentEvent, ShipmentEvent};
use crate::domain::money::Currency;
use crate::domain::payment::{PaymentIntent, PaymentMethod, PaymentStatus};
use crate::domain::shipment::{Shipment, ShipmentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentView {
    pub id: Uuid,
    pub order_id: u64,
    pub amount: Decimal,
    pub refunded_amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider: String,
    pub external_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    #[serde(rename = "requires3DSecure")]
    pub requires_3d_secure: bool,
    #[serde(rename = "threeDSecureUrl")]
    pub three_d_secure_url: Option<String>,
    pub installment_count: Option<u32>,
    pub installment_amount: Option<Decimal>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentIntent> for PaymentIntentView {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            order_id: intent.order_id,
            amount: intent.amount,
            refunded_amount: intent.refunded_amount,
            currency: intent.currency,
            method: intent.method,
            status: intent.status,
            provider: intent.provider,
            external_reference: intent.external_reference,
            failure_reason: intent.failure_reason,
            card_last4: intent.card_last4,
            card_brand: intent.card_brand,
            requires_3d_secure: intent.requires_3d_secure,
            three_d_secure_url: intent.three_d_secure_url,
            installment_count: intent.installment_count,
            installment_amount: intent.installment_amount,
            metadata: intent.metadata,
            authorized_at: intent.authorized_at,
            captured_at: intent.captured_at,
            failed_at: intent.failed_at,
            refunded_at: intent.refunded_at,
            expires_at: intent.expires_at,
            created_at: intent.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventView {
    pub id: Uuid,
    pub payment_intent_id: Uuid,
    pub status: PaymentStatus,
    pub event_type: String,
    pub payload: Option<Value>,
    pub source: EventSource,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentEvent> for PaymentEventView {
    fn from(event: PaymentEvent) -> Self {
        Self {
            id: event.id,
            payment_intent_id: event.payment_intent_id,
            status: event.status,
            event_type: event.event_type,
            payload: event.payload,
            source: event.source,
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentView {
    pub id: Uuid,
    pub seller_order_id: u64,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub status: ShipmentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<Shipment> for ShipmentView {
    fn from(shipment: Shipment) -> Self {
        Self {
            id: shipment.id,
            seller_order_id: shipment.seller_order_id,
            carrier: shipment.carrier,
            tracking_number: shipment.tracking_number,
            status: shipment.status,
            shipped_at: shipment.shipped_at,
            delivered_at: shipment.delivered_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentEventView {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: ShipmentStatus,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<ShipmentEvent> for ShipmentEventView {
    fn from(event: ShipmentEvent) -> Self {
        Self {
            id: event.id,
            shipment_id: event.shipment_id,
            status: event.status,
            payload: event.payload,
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundRequest {
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmThreeDSecureRequest {
    pub result: String,
}

/// `payload` is the provider's JSON, either embedded as an object or
/// already serialized into a string.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    pub payload: Value,
    pub signature: Option<String>,
}

impl WebhookRequest {
    pub fn raw_payload(&self) -> String {
        match &self.payload {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}
