//! Saga participant identities and step outcomes.

use serde::{Deserialize, Serialize};

/// Who last wrote an event.
///
/// The `*_SERVICE` spellings are accepted on input for compatibility with
/// producers that name participants after their deployable service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    /// The saga orchestrator.
    Orchestrator,

    /// The product validation participant.
    #[serde(alias = "PRODUCT_VALIDATION_SERVICE")]
    ProductValidation,

    /// The payment participant.
    #[serde(alias = "PAYMENT_SERVICE")]
    Payment,

    /// The inventory participant.
    #[serde(alias = "INVENTORY_SERVICE")]
    Inventory,
}

impl EventSource {
    /// Every source, in saga order.
    pub const ALL: [EventSource; 4] = [
        EventSource::Orchestrator,
        EventSource::ProductValidation,
        EventSource::Payment,
        EventSource::Inventory,
    ];

    /// Returns true for the saga participants (everything but the orchestrator).
    pub fn is_participant(&self) -> bool {
        !matches!(self, EventSource::Orchestrator)
    }

    /// Returns the wire name of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Orchestrator => "ORCHESTRATOR",
            EventSource::ProductValidation => "PRODUCT_VALIDATION",
            EventSource::Payment => "PAYMENT",
            EventSource::Inventory => "INVENTORY",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the last action recorded on an event.
///
/// ```text
/// SUCCESS           ──► next participant's forward topic
/// ROLLBACK_PENDING  ──► same participant's compensation topic
/// FAIL              ──► previous participant's compensation topic
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// The action completed.
    Success,

    /// The action failed; the same participant must undo partial effects.
    RollbackPending,

    /// The participant has compensated; unwinding moves one hop backward.
    Fail,
}

impl SagaStatus {
    /// Every status.
    pub const ALL: [SagaStatus; 3] = [
        SagaStatus::Success,
        SagaStatus::RollbackPending,
        SagaStatus::Fail,
    ];

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Success => "SUCCESS",
            SagaStatus::RollbackPending => "ROLLBACK_PENDING",
            SagaStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventSource::ProductValidation).unwrap(),
            "\"PRODUCT_VALIDATION\""
        );
        assert_eq!(
            serde_json::to_string(&SagaStatus::RollbackPending).unwrap(),
            "\"ROLLBACK_PENDING\""
        );
        for source in EventSource::ALL {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
        for status in SagaStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_service_aliases() {
        let source: EventSource = serde_json::from_str("\"PAYMENT_SERVICE\"").unwrap();
        assert_eq!(source, EventSource::Payment);
        let source: EventSource = serde_json::from_str("\"INVENTORY_SERVICE\"").unwrap();
        assert_eq!(source, EventSource::Inventory);
        let source: EventSource =
            serde_json::from_str("\"PRODUCT_VALIDATION_SERVICE\"").unwrap();
        assert_eq!(source, EventSource::ProductValidation);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(serde_json::from_str::<SagaStatus>("\"PENDING\"").is_err());
    }

    #[test]
    fn test_is_participant() {
        assert!(!EventSource::Orchestrator.is_participant());
        assert!(EventSource::Payment.is_participant());
    }
}
