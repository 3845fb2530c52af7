//! Order ledger and related types.

mod commands;
mod ledger;
mod model;
mod state;

pub use commands::{PlaceOrder, StatusChange};
pub use ledger::OrderLedger;
pub use model::{Order, OrderView, PaymentOutcome, Purchaser};
pub use state::{OrderStatus, PaymentStatus};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order's current status does not allow the requested one.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The book has no units left.
    #[error("Book {book_id} is out of stock")]
    OutOfStock { book_id: String },

    /// A cancelled order cannot be paid.
    #[error("Order {order_id} is cancelled")]
    Cancelled { order_id: String },

    /// The order changed between reading and writing it.
    #[error("Order {order_id} was modified concurrently")]
    ConcurrentModification { order_id: String },

    /// The payment intent was already spent on another order.
    #[error("Payment intent {intent_id} already paid for another order")]
    IntentAlreadyUsed { intent_id: String },
}
