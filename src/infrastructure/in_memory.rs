use crate::domain::event::{PaymentEvent, ShipmentEvent};
use crate::domain::order::{Order, PaymentNotice, PaymentOutcome, SellerOrder, SellerOrderStatus};
use crate::domain::payment::PaymentIntent;
use crate::domain::ports::{
    Notifier, OrderDirectory, PaymentStore, SellerOrderDirectory, ShipmentStore,
};
use crate::domain::shipment::Shipment;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct PaymentTables {
    intents: HashMap<Uuid, PaymentIntent>,
    by_order: HashMap<u64, Uuid>,
    by_reference: HashMap<String, Uuid>,
    events: HashMap<Uuid, Vec<PaymentEvent>>,
}

impl PaymentTables {
    fn index_reference(&mut self, intent: &PaymentIntent) {
        if let Some(reference) = intent.external_reference.as_ref() {
            self.by_reference.insert(reference.clone(), intent.id);
        }
    }
}

/// A thread-safe in-memory payment store.
///
/// All tables sit behind one `RwLock`, so a commit (row, indexes and events)
/// is observed entirely or not at all.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<PaymentTables>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, intent: PaymentIntent, event: PaymentEvent) -> Result<PaymentIntent> {
        let mut tables = self.tables.write().await;
        if tables.by_order.contains_key(&intent.order_id) {
            return Err(PaymentError::conflict(format!(
                "PaymentIntent already exists for OrderId={}",
                intent.order_id
            )));
        }

        tables.by_order.insert(intent.order_id, intent.id);
        tables.index_reference(&intent);
        tables.events.insert(intent.id, vec![event]);
        tables.intents.insert(intent.id, intent.clone());
        Ok(intent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentIntent>> {
        let tables = self.tables.read().await;
        Ok(tables.intents.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: u64) -> Result<Option<PaymentIntent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_order
            .get(&order_id)
            .and_then(|id| tables.intents.get(id))
            .cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PaymentIntent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_reference
            .get(reference)
            .and_then(|id| tables.intents.get(id))
            .cloned())
    }

    async fn commit(
        &self,
        mut intent: PaymentIntent,
        expected_version: u64,
        events: Vec<PaymentEvent>,
    ) -> Result<PaymentIntent> {
        let mut tables = self.tables.write().await;
        let stored_version = tables
            .intents
            .get(&intent.id)
            .map(|stored| stored.version)
            .ok_or_else(|| PaymentError::not_found(format!("PaymentIntent not found. Id={}", intent.id)))?;
        if stored_version != expected_version {
            return Err(PaymentError::conflict(format!(
                "PaymentIntent {} was modified concurrently",
                intent.id
            )));
        }

        intent.version = expected_version + 1;
        tables.index_reference(&intent);
        tables.events.entry(intent.id).or_default().extend(events);
        tables.intents.insert(intent.id, intent.clone());
        Ok(intent)
    }

    async fn append_event(&self, event: PaymentEvent) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.intents.contains_key(&event.payment_intent_id) {
            return Err(PaymentError::not_found(format!(
                "PaymentIntent not found. Id={}",
                event.payment_intent_id
            )));
        }
        tables
            .events
            .entry(event.payment_intent_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn events(&self, intent_id: Uuid) -> Result<Vec<PaymentEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.events.get(&intent_id).cloned().unwrap_or_default())
    }

    async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>> {
        let tables = self.tables.read().await;
        let mut overdue: Vec<_> = tables
            .intents
            .values()
            .filter(|intent| intent.is_overdue(now))
            .cloned()
            .collect();
        overdue.sort_by_key(|intent| intent.expires_at);
        Ok(overdue)
    }
}

#[derive(Default)]
struct ShipmentTables {
    shipments: HashMap<Uuid, Shipment>,
    by_seller_order: HashMap<u64, Uuid>,
    events: HashMap<Uuid, Vec<ShipmentEvent>>,
}

/// A thread-safe in-memory shipment store. Archived shipments keep their
/// seller order slot, so a seller order never gets a second shipment.
#[derive(Default, Clone)]
pub struct InMemoryShipmentStore {
    tables: Arc<RwLock<ShipmentTables>>,
}

impl InMemoryShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShipmentStore for InMemoryShipmentStore {
    async fn find_by_seller_order(&self, seller_order_id: u64) -> Result<Option<Shipment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_seller_order
            .get(&seller_order_id)
            .and_then(|id| tables.shipments.get(id))
            .filter(|shipment| !shipment.is_deleted())
            .cloned())
    }

    async fn save(
        &self,
        mut shipment: Shipment,
        expected_version: Option<u64>,
        event: ShipmentEvent,
    ) -> Result<Shipment> {
        let mut tables = self.tables.write().await;
        match expected_version {
            None => {
                if tables.by_seller_order.contains_key(&shipment.seller_order_id) {
                    return Err(PaymentError::conflict(format!(
                        "Shipment already exists for SellerOrderId={}",
                        shipment.seller_order_id
                    )));
                }
                shipment.version = 0;
                tables
                    .by_seller_order
                    .insert(shipment.seller_order_id, shipment.id);
            }
            Some(expected) => {
                let stored = tables.shipments.get(&shipment.id).ok_or_else(|| {
                    PaymentError::not_found(format!("Shipment not found. Id={}", shipment.id))
                })?;
                if stored.version != expected {
                    return Err(PaymentError::conflict(format!(
                        "Shipment {} was modified concurrently",
                        shipment.id
                    )));
                }
                shipment.version = expected + 1;
            }
        }

        tables.events.entry(shipment.id).or_default().push(event);
        tables.shipments.insert(shipment.id, shipment.clone());
        Ok(shipment)
    }

    async fn timeline(&self, shipment_id: Uuid) -> Result<Vec<ShipmentEvent>> {
        let tables = self.tables.read().await;
        let live = tables
            .shipments
            .get(&shipment_id)
            .is_some_and(|shipment| !shipment.is_deleted());
        if !live {
            return Ok(Vec::new());
        }
        Ok(tables.events.get(&shipment_id).cloned().unwrap_or_default())
    }
}

/// In-process stand-in for the order subsystem: orders and seller orders
/// keyed by id. Clones share the same book.
#[derive(Default, Clone)]
pub struct InMemoryOrderBook {
    orders: Arc<RwLock<HashMap<u64, Order>>>,
    seller_orders: Arc<RwLock<HashMap<u64, SellerOrder>>>,
}

impl InMemoryOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_order(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    pub async fn insert_seller_order(&self, seller_order: SellerOrder) {
        self.seller_orders
            .write()
            .await
            .insert(seller_order.id, seller_order);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrderBook {
    async fn order(&self, order_id: u64) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn record_payment_outcome(&self, order_id: u64, outcome: PaymentOutcome) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| PaymentError::not_found(format!("Order not found. OrderId={order_id}")))?;
        order.apply_outcome(outcome);
        Ok(())
    }
}

#[async_trait]
impl SellerOrderDirectory for InMemoryOrderBook {
    async fn seller_order(&self, seller_order_id: u64) -> Result<Option<SellerOrder>> {
        Ok(self
            .seller_orders
            .read()
            .await
            .get(&seller_order_id)
            .cloned())
    }

    async fn set_seller_order_status(
        &self,
        seller_order_id: u64,
        status: SellerOrderStatus,
    ) -> Result<()> {
        let mut seller_orders = self.seller_orders.write().await;
        let seller_order = seller_orders.get_mut(&seller_order_id).ok_or_else(|| {
            PaymentError::not_found(format!("SellerOrder not found. Id={seller_order_id}"))
        })?;
        seller_order.status = status;
        Ok(())
    }
}

/// Emits each notice as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notice: PaymentNotice) {
        info!(
            buyer_id = notice.buyer_id,
            order_id = notice.order_id,
            title = %notice.title,
            "{}",
            notice.message
        );
    }
}

/// Keeps every notice in memory; clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Arc<RwLock<Vec<PaymentNotice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notices(&self) -> Vec<PaymentNotice> {
        self.notices.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: PaymentNotice) {
        self.notices.write().await.push(notice);
    }
}
