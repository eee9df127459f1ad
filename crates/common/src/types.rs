use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single event instance on the wire.
///
/// Wraps a UUID so event ids cannot be mixed up with order or
/// transaction identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of the business order. Stable across the whole saga.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random order ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the order ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no identifier was informed.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of one saga attempt.
///
/// Generated as `<epoch-millis>_<uuid>` so ids sort roughly by creation time
/// while remaining unique across orchestrator instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Creates a transaction ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh transaction ID for a new saga attempt.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("{}_{}", millis, Uuid::new_v4()))
    }

    /// Returns the transaction ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no identifier was informed.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_new_creates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn event_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(EventId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn transaction_id_has_millis_prefix() {
        let id = TransactionId::generate();
        let (millis, uuid) = id.as_str().split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert!(Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn generated_transaction_ids_differ() {
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn blank_ids_are_empty() {
        assert!(OrderId::new("  ").is_empty());
        assert!(TransactionId::default().is_empty());
        assert!(!OrderId::generate().is_empty());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = OrderId::new("order-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"order-1\"");
        let tx: TransactionId = serde_json::from_str("\"1_abc\"").unwrap();
        assert_eq!(tx.as_str(), "1_abc");
    }
}
