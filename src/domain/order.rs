//! Views of the order subsystem, which lives outside this crate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub buyer_id: u64,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(id: u64, buyer_id: u64, total_amount: Decimal) -> Self {
        Self {
            id,
            buyer_id,
            total_amount,
            status: OrderStatus::Pending,
            paid_at: None,
        }
    }

    pub fn apply_outcome(&mut self, outcome: PaymentOutcome) {
        match outcome {
            PaymentOutcome::Succeeded { paid_at } => {
                self.status = OrderStatus::Processing;
                self.paid_at = Some(paid_at);
            }
            PaymentOutcome::Failed => self.status = OrderStatus::Failed,
        }
    }
}

/// What the payment core reports back to the order subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded { paid_at: DateTime<Utc> },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellerOrderStatus {
    Pending,
    Shipped,
    Delivered,
}

/// Per-seller slice of a multi-seller order; carries its own shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerOrder {
    pub id: u64,
    pub order_id: u64,
    pub status: SellerOrderStatus,
}

impl SellerOrder {
    pub fn new(id: u64, order_id: u64) -> Self {
        Self {
            id,
            order_id,
            status: SellerOrderStatus::Pending,
        }
    }
}

/// Fire-and-forget message for the notification subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotice {
    pub buyer_id: u64,
    pub order_id: u64,
    pub title: String,
    pub message: String,
}
