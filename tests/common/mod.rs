#![allow(dead_code)]

use paytrail::application::payments::PaymentService;
use paytrail::application::shipments::ShipmentService;
use paytrail::domain::order::{Order, SellerOrder};
use paytrail::domain::payment::{CardDetails, CreateIntentRequest, PaymentMethod};
use paytrail::domain::policy::PaymentPolicy;
use paytrail::infrastructure::in_memory::{
    InMemoryOrderBook, InMemoryPaymentStore, InMemoryShipmentStore, RecordingNotifier,
};
use rust_decimal::Decimal;

pub const BUYER_ID: u64 = 42;

/// Payment service over in-memory adapters, with handles to inspect them.
pub struct Harness {
    pub payments: PaymentService,
    pub store: InMemoryPaymentStore,
    pub book: InMemoryOrderBook,
    pub notifier: RecordingNotifier,
}

pub async fn harness(orders: &[(u64, Decimal)]) -> Harness {
    let book = InMemoryOrderBook::new();
    for (id, total) in orders {
        book.insert_order(Order::new(*id, BUYER_ID, *total)).await;
    }
    let store = InMemoryPaymentStore::new();
    let notifier = RecordingNotifier::new();
    let payments = PaymentService::new(
        Box::new(store.clone()),
        Box::new(book.clone()),
        Box::new(notifier.clone()),
        PaymentPolicy::default(),
    );
    Harness {
        payments,
        store,
        book,
        notifier,
    }
}

pub async fn shipment_service(seller_orders: &[u64]) -> (ShipmentService, InMemoryOrderBook) {
    let book = InMemoryOrderBook::new();
    for id in seller_orders {
        book.insert_seller_order(SellerOrder::new(*id, 1)).await;
    }
    let service = ShipmentService::new(
        Box::new(InMemoryShipmentStore::new()),
        Box::new(book.clone()),
    );
    (service, book)
}

pub fn card_request(order_id: u64, number: &str) -> CreateIntentRequest {
    let mut request = CreateIntentRequest::new(order_id, PaymentMethod::CreditCard);
    request.card_details = Some(CardDetails {
        card_number: number.to_string(),
        expiry_date: "12/30".to_string(),
        cvv: "123".to_string(),
        card_holder_name: "Test Buyer".to_string(),
    });
    request.return_url = Some("https://shop.test/return".to_string());
    request
}

pub fn transfer_request(order_id: u64) -> CreateIntentRequest {
    CreateIntentRequest::new(order_id, PaymentMethod::BankTransfer)
}
