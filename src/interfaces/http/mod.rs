//! HTTP surface of the payment core, built on axum.

pub mod dto;
pub mod error;
pub mod extract;
pub mod payments;
pub mod shipments;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};

use crate::application::payments::PaymentService;
use crate::application::shipments::ShipmentService;

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub shipments: Arc<ShipmentService>,
}

impl AppState {
    pub fn new(payments: PaymentService, shipments: ShipmentService) -> Self {
        Self {
            payments: Arc::new(payments),
            shipments: Arc::new(shipments),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let payments = Router::new()
        .route("/intents", post(payments::create_intent))
        .route("/intents/:id", get(payments::get_intent))
        .route("/intents/:id/authorize", post(payments::authorize))
        .route("/intents/:id/capture", post(payments::capture))
        .route("/intents/:id/cancel", post(payments::cancel))
        .route("/intents/:id/fail", post(payments::fail))
        .route("/intents/:id/refund", post(payments::refund))
        .route("/intents/:id/3ds/confirm", post(payments::confirm_3d_secure))
        .route("/intents/:id/mark-received", post(payments::mark_received))
        .route("/intents/:id/simulate-success", post(payments::simulate_success))
        .route("/intents/:id/simulate-fail", post(payments::simulate_fail))
        .route("/intents/:id/events", get(payments::events))
        .route("/order/:order_id", get(payments::get_by_order))
        .route("/reference/:reference", get(payments::get_by_reference))
        .route("/webhook/:provider", post(payments::webhook));

    let shipments = Router::new()
        .route(
            "/seller-orders/:id",
            get(shipments::get).delete(shipments::archive),
        )
        .route("/seller-orders/:id/pack", patch(shipments::pack))
        .route("/seller-orders/:id/ship", patch(shipments::ship))
        .route("/seller-orders/:id/deliver", patch(shipments::deliver))
        .route("/seller-orders/:id/timeline", get(shipments::timeline));

    Router::new()
        .nest("/api/payments", payments)
        .nest("/api/shipments", shipments)
        .with_state(state)
}
