//! Shared identifier types for the order saga services.

pub mod types;

pub use types::{EventId, OrderId, TransactionId};
