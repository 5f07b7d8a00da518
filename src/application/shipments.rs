use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::event::ShipmentEvent;
use crate::domain::order::{SellerOrder, SellerOrderStatus};
use crate::domain::ports::{SellerOrderDirectoryBox, ShipmentStoreBox};
use crate::domain::shipment::Shipment;
use crate::error::{PaymentError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipRequest {
    pub carrier: String,
    pub tracking_number: String,
}

/// Fulfilment workflow of a seller order: one shipment per seller order,
/// created lazily on the first seller action.
pub struct ShipmentService {
    store: ShipmentStoreBox,
    seller_orders: SellerOrderDirectoryBox,
}

impl ShipmentService {
    pub fn new(store: ShipmentStoreBox, seller_orders: SellerOrderDirectoryBox) -> Self {
        Self {
            store,
            seller_orders,
        }
    }

    async fn seller_order(&self, seller_order_id: u64) -> Result<SellerOrder> {
        self.seller_orders
            .seller_order(seller_order_id)
            .await?
            .ok_or_else(|| {
                PaymentError::not_found(format!("SellerOrder not found. Id={seller_order_id}"))
            })
    }

    async fn live_shipment(&self, seller_order_id: u64) -> Result<Shipment> {
        self.store
            .find_by_seller_order(seller_order_id)
            .await?
            .ok_or_else(|| {
                PaymentError::not_found(format!(
                    "Shipment not found for SellerOrderId={seller_order_id}"
                ))
            })
    }

    /// Loads (or starts) the shipment, applies `step` and stores it with one
    /// event. A concurrent writer surfaces as `Conflict`.
    async fn apply<F>(&self, seller_order_id: u64, create: bool, step: F) -> Result<Shipment>
    where
        F: FnOnce(&mut Shipment, DateTime<Utc>) -> Result<Value> + Send,
    {
        let now = Utc::now();
        let (mut shipment, expected_version) =
            match self.store.find_by_seller_order(seller_order_id).await? {
                Some(shipment) => {
                    let version = shipment.version;
                    (shipment, Some(version))
                }
                None if create => (Shipment::new(seller_order_id, now), None),
                None => {
                    return Err(PaymentError::bad_request(
                        "Shipment does not exist. Ship it first",
                    ));
                }
            };

        let payload = step(&mut shipment, now)?;
        let event = ShipmentEvent::new(&shipment, Some(payload), now);
        self.store.save(shipment, expected_version, event).await
    }

    pub async fn get(&self, seller_order_id: u64) -> Result<Shipment> {
        self.live_shipment(seller_order_id).await
    }

    pub async fn pack(&self, seller_order_id: u64) -> Result<Shipment> {
        self.seller_order(seller_order_id).await?;
        self.apply(seller_order_id, true, |shipment, _| {
            shipment.pack()?;
            Ok(json!({ "action": "pack" }))
        })
        .await
    }

    pub async fn ship(&self, seller_order_id: u64, request: ShipRequest) -> Result<Shipment> {
        self.seller_order(seller_order_id).await?;
        let shipment = self
            .apply(seller_order_id, true, |shipment, now| {
                shipment.ship(&request.carrier, &request.tracking_number, now)?;
                Ok(json!({
                    "action": "ship",
                    "carrier": shipment.carrier,
                    "tracking": shipment.tracking_number,
                }))
            })
            .await?;
        self.seller_orders
            .set_seller_order_status(seller_order_id, SellerOrderStatus::Shipped)
            .await?;
        Ok(shipment)
    }

    pub async fn deliver(&self, seller_order_id: u64) -> Result<Shipment> {
        self.seller_order(seller_order_id).await?;
        let shipment = self
            .apply(seller_order_id, false, |shipment, now| {
                shipment.deliver(now)?;
                Ok(json!({ "action": "deliver" }))
            })
            .await?;
        self.seller_orders
            .set_seller_order_status(seller_order_id, SellerOrderStatus::Delivered)
            .await?;
        Ok(shipment)
    }

    /// Events of the live shipment, oldest first.
    pub async fn timeline(&self, seller_order_id: u64) -> Result<Vec<ShipmentEvent>> {
        let shipment = self.live_shipment(seller_order_id).await?;
        let mut events = self.store.timeline(shipment.id).await?;
        events.sort_by_key(|event| event.created_at);
        Ok(events)
    }

    /// Soft-deletes the shipment; it and its events disappear from reads.
    pub async fn archive(&self, seller_order_id: u64) -> Result<Shipment> {
        self.live_shipment(seller_order_id).await?;
        self.apply(seller_order_id, false, |shipment, now| {
            shipment.archive(now);
            Ok(json!({ "action": "archive" }))
        })
        .await
    }
}
