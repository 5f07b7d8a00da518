//! Application layer orchestrating the payment and shipment workflows.
//!
//! [`payments::PaymentService`] owns every payment status change. The 3-D
//! Secure and webhook adapters extend it with callbacks that resolve into the
//! same guarded transitions. [`shipments::ShipmentService`] runs the smaller
//! fulfilment workflow of a seller order.

pub mod payments;
pub mod shipments;
pub mod three_d_secure;
pub mod webhook;
