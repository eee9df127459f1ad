//! Saga error types.

use broker::BrokerError;
use thiserror::Error;

use crate::routing::RoutingKey;
use crate::status::EventSource;

/// Errors that can occur while routing or executing saga steps.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A precondition was violated (duplicate transaction, missing fields,
    /// unknown product, insufficient stock, amount below minimum, no route).
    #[error("{0}")]
    Validation(String),

    /// Reversing a previously completed action failed.
    #[error("Compensation failed for {participant}: {reason}")]
    Compensation {
        participant: EventSource,
        reason: String,
    },

    /// A participant store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The broker rejected a publish.
    #[error("Transport error: {0}")]
    Transport(#[from] BrokerError),

    /// An event could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SagaError::Validation(message.into())
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, SagaError::Validation(_))
    }
}

/// Errors detected while building a routing table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingTableError {
    /// Two rules share the same (source, status) key.
    #[error("Duplicate route for {0}")]
    DuplicateRoute(RoutingKey),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
