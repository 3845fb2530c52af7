//! Shared identifier types for the BookCourier backend.

pub mod types;

pub use types::{DocumentId, Email, InvalidEmail};
