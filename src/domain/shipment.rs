use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PaymentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Created,
    Packed,
    Shipped,
    Delivered,
}

/// `Shipped -> Shipped` is a tracking update.
pub const SHIPMENT_TRANSITIONS: &[(ShipmentStatus, &[ShipmentStatus])] = &[
    (
        ShipmentStatus::Created,
        &[ShipmentStatus::Packed, ShipmentStatus::Shipped],
    ),
    (ShipmentStatus::Packed, &[ShipmentStatus::Shipped]),
    (
        ShipmentStatus::Shipped,
        &[ShipmentStatus::Shipped, ShipmentStatus::Delivered],
    ),
];

impl ShipmentStatus {
    pub fn can_transition_to(self, target: ShipmentStatus) -> bool {
        SHIPMENT_TRANSITIONS
            .iter()
            .find(|(from, _)| *from == self)
            .is_some_and(|(_, targets)| targets.contains(&target))
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub seller_order_id: u64,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub status: ShipmentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; archived shipments and their events are hidden from reads.
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Shipment {
    pub fn new(seller_order_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_order_id,
            carrier: None,
            tracking_number: None,
            status: ShipmentStatus::Created,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            deleted_at: None,
            version: 0,
        }
    }

    pub fn pack(&mut self) -> Result<()> {
        if !self.status.can_transition_to(ShipmentStatus::Packed) {
            return Err(PaymentError::bad_request(format!(
                "Shipment cannot be packed from {}",
                self.status
            )));
        }
        self.status = ShipmentStatus::Packed;
        Ok(())
    }

    /// Ships, or updates carrier and tracking on an already shipped parcel.
    /// `shipped_at` is stamped only once.
    pub fn ship(&mut self, carrier: &str, tracking_number: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status == ShipmentStatus::Delivered {
            return Err(PaymentError::bad_request(
                "Delivered shipment cannot be shipped again",
            ));
        }
        if !self.status.can_transition_to(ShipmentStatus::Shipped) {
            return Err(PaymentError::bad_request(format!(
                "Shipment cannot be shipped from {}",
                self.status
            )));
        }

        let (carrier, tracking_number) = (carrier.trim(), tracking_number.trim());
        if carrier.is_empty() || tracking_number.is_empty() {
            return Err(PaymentError::bad_request(
                "Carrier and tracking number are required",
            ));
        }

        self.carrier = Some(carrier.to_string());
        self.tracking_number = Some(tracking_number.to_string());
        self.status = ShipmentStatus::Shipped;
        self.shipped_at.get_or_insert(now);
        Ok(())
    }

    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ShipmentStatus::Shipped {
            return Err(PaymentError::bad_request(
                "Shipment must be Shipped before it can be delivered",
            ));
        }
        self.status = ShipmentStatus::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.deleted_at.get_or_insert(now);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ship_from_created_and_packed() {
        let now = Utc::now();
        let mut shipment = Shipment::new(1, now);
        shipment.ship(" UPS ", " 1Z999 ", now).unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Shipped);
        assert_eq!(shipment.carrier.as_deref(), Some("UPS"));
        assert_eq!(shipment.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(shipment.shipped_at, Some(now));

        let mut packed = Shipment::new(2, now);
        packed.pack().unwrap();
        packed.ship("DHL", "X1", now).unwrap();
        assert_eq!(packed.status, ShipmentStatus::Shipped);
    }

    #[test]
    fn test_reship_updates_tracking_without_restamping() {
        let first = Utc::now();
        let mut shipment = Shipment::new(1, first);
        shipment.ship("UPS", "A", first).unwrap();

        let later = first + chrono::Duration::hours(1);
        shipment.ship("DHL", "B", later).unwrap();
        assert_eq!(shipment.shipped_at, Some(first));
        assert_eq!(shipment.carrier.as_deref(), Some("DHL"));
        assert_eq!(shipment.tracking_number.as_deref(), Some("B"));
    }

    #[test]
    fn test_delivered_cannot_ship_or_pack() {
        let now = Utc::now();
        let mut shipment = Shipment::new(1, now);
        shipment.ship("UPS", "A", now).unwrap();
        shipment.deliver(now).unwrap();

        let before = shipment.clone();
        assert!(matches!(
            shipment.ship("UPS", "B", now),
            Err(PaymentError::BadRequest(_))
        ));
        assert!(matches!(shipment.pack(), Err(PaymentError::BadRequest(_))));
        assert_eq!(shipment, before);
    }

    #[test]
    fn test_deliver_requires_shipped() {
        let now = Utc::now();
        let mut shipment = Shipment::new(1, now);
        assert!(matches!(
            shipment.deliver(now),
            Err(PaymentError::BadRequest(_))
        ));
        assert!(shipment.delivered_at.is_none());
    }

    #[test]
    fn test_ship_requires_carrier_and_tracking() {
        let now = Utc::now();
        let mut shipment = Shipment::new(1, now);
        assert!(shipment.ship("  ", "A", now).is_err());
        assert_eq!(shipment.status, ShipmentStatus::Created);
    }
}
