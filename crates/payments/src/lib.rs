//! Payment bridge for the BookCourier backend.
//!
//! This crate connects orders to an external payment processor:
//! 1. Create a payment intent for a positive amount
//! 2. The client confirms the charge with the processor
//! 3. The confirmed intent is reconciled into the order ledger, which marks
//!    the order paid and takes one unit of stock
//!
//! Reconciliation is the only way an order becomes paid.

pub mod bridge;
pub mod error;
pub mod processor;

pub use bridge::PaymentBridge;
pub use error::{PaymentError, Result};
pub use processor::{InMemoryPaymentProcessor, IntentStatus, PaymentIntent, PaymentProcessor};
