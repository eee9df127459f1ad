use thiserror::Error;

/// Errors that can occur when publishing or consuming messages.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker (or a subscription channel) has been shut down.
    #[error("Broker closed")]
    Closed,

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A handler failed to process a message.
    #[error("Handler failed for topic {topic}: {reason}")]
    Handler { topic: String, reason: String },

    /// No handler is registered for the topic.
    #[error("No handler registered for topic: {0}")]
    NoHandler(String),
}

impl BrokerError {
    /// Creates a handler error from any displayable failure.
    pub fn handler(topic: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BrokerError::Handler {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
