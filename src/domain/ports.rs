use super::event::{PaymentEvent, ShipmentEvent};
use super::order::{Order, PaymentNotice, PaymentOutcome, SellerOrder, SellerOrderStatus};
use super::payment::PaymentIntent;
use super::shipment::Shipment;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Durable storage for payment intents and their event ledger.
///
/// Every write is all-or-nothing: an intent and the events recorded with it
/// are committed together or not at all.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new intent with its opening event.
    ///
    /// Fails with `Conflict` when an intent already exists for the same order.
    async fn insert(&self, intent: PaymentIntent, event: PaymentEvent) -> Result<PaymentIntent>;

    async fn get(&self, id: Uuid) -> Result<Option<PaymentIntent>>;

    async fn find_by_order(&self, order_id: u64) -> Result<Option<PaymentIntent>>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PaymentIntent>>;

    /// Replaces the stored intent if its version still equals
    /// `expected_version`, appending `events` in the same write. Returns the
    /// intent with its bumped version, or `Conflict` if another writer won.
    async fn commit(
        &self,
        intent: PaymentIntent,
        expected_version: u64,
        events: Vec<PaymentEvent>,
    ) -> Result<PaymentIntent>;

    /// Appends a side-event that does not change the intent.
    async fn append_event(&self, event: PaymentEvent) -> Result<()>;

    /// Ledger of one intent, oldest first.
    async fn events(&self, intent_id: Uuid) -> Result<Vec<PaymentEvent>>;

    /// Intents still open whose expiry has passed.
    async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>>;
}

#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Live (not archived) shipment of a seller order.
    async fn find_by_seller_order(&self, seller_order_id: u64) -> Result<Option<Shipment>>;

    /// Inserts (`expected_version == None`) or updates a shipment together
    /// with one event. Inserting a second shipment for the same seller order,
    /// or updating a stale version, fails with `Conflict`.
    async fn save(
        &self,
        shipment: Shipment,
        expected_version: Option<u64>,
        event: ShipmentEvent,
    ) -> Result<Shipment>;

    /// Events of a live shipment, oldest first. Empty once the shipment is archived.
    async fn timeline(&self, shipment_id: Uuid) -> Result<Vec<ShipmentEvent>>;
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn order(&self, order_id: u64) -> Result<Option<Order>>;
    async fn record_payment_outcome(&self, order_id: u64, outcome: PaymentOutcome) -> Result<()>;
}

#[async_trait]
pub trait SellerOrderDirectory: Send + Sync {
    async fn seller_order(&self, seller_order_id: u64) -> Result<Option<SellerOrder>>;
    async fn set_seller_order_status(
        &self,
        seller_order_id: u64,
        status: SellerOrderStatus,
    ) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget; delivery failures are the notifier's own concern.
    async fn notify(&self, notice: PaymentNotice);
}

/// Verifies webhook signatures for a provider. A rejected signature is
/// reported as `PaymentError::Unauthorized`, which ingestion returns as-is.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, provider: &str, payload: &str, signature: Option<&str>) -> Result<()>;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type ShipmentStoreBox = Box<dyn ShipmentStore>;
pub type OrderDirectoryBox = Box<dyn OrderDirectory>;
pub type SellerOrderDirectoryBox = Box<dyn SellerOrderDirectory>;
pub type NotifierBox = Box<dyn Notifier>;
pub type SignatureVerifierBox = Box<dyn SignatureVerifier>;
