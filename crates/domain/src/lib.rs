//! Domain layer for the BookCourier backend.
//!
//! This crate provides the business rules on top of the document store:
//! - Role-based access control over verified identities
//! - Identity directory with upsert-by-email registration
//! - Book catalog with ownership rules, reviews and cascading deletes
//! - Order ledger with lifecycle and payment-driven stock adjustment
//! - Per-user wishlist

pub mod access;
pub mod catalog;
pub mod error;
pub mod order;
pub mod user;
pub mod value_objects;
pub mod wishlist;

pub use access::{
    AccessControl, Caller, IdentityVerifier, InMemoryIdentityVerifier, VerificationError,
};
pub use catalog::{Book, BookPatch, BookStatus, Catalog, DeletedBook, NewBook, Review, ReviewInput};
pub use error::{DomainError, Result};
pub use order::{
    Order, OrderError, OrderLedger, OrderStatus, OrderView, PaymentOutcome, PaymentStatus,
    PlaceOrder, Purchaser, StatusChange,
};
pub use user::{Directory, Registration, Role, User};
pub use value_objects::Money;
pub use wishlist::{Wishlist, WishlistEntry, WishlistItem};
