//! Domain layer: payment and shipment state machines, their ledgers, and the
//! ports through which the application layer reaches storage and the
//! order/notification subsystems. Nothing here performs I/O.

pub mod event;
pub mod money;
pub mod order;
pub mod payment;
pub mod policy;
pub mod ports;
pub mod shipment;
