//! Logical topic names used by the saga.

use std::str::FromStr;

use crate::error::SagaError;
use crate::status::EventSource;

/// A logical channel on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// New orders waiting for a saga (consumed by the orchestrator).
    StartSaga,
    /// Participant reports (consumed by the orchestrator).
    Orchestrator,
    /// Saga completed (consumed by the orchestrator).
    FinishSuccess,
    /// Saga unwound (consumed by the orchestrator).
    FinishFail,
    /// Product validation forward step.
    ProductValidationSuccess,
    /// Product validation compensation.
    ProductValidationFail,
    /// Payment forward step.
    PaymentSuccess,
    /// Payment compensation.
    PaymentFail,
    /// Inventory forward step.
    InventorySuccess,
    /// Inventory compensation.
    InventoryFail,
    /// Saga ended notification (consumed by the order service).
    NotifyEnding,
}

impl Topic {
    /// Every topic.
    pub const ALL: [Topic; 11] = [
        Topic::StartSaga,
        Topic::Orchestrator,
        Topic::FinishSuccess,
        Topic::FinishFail,
        Topic::ProductValidationSuccess,
        Topic::ProductValidationFail,
        Topic::PaymentSuccess,
        Topic::PaymentFail,
        Topic::InventorySuccess,
        Topic::InventoryFail,
        Topic::NotifyEnding,
    ];

    /// Returns the broker topic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::StartSaga => "start-saga",
            Topic::Orchestrator => "orchestrator",
            Topic::FinishSuccess => "finish-success",
            Topic::FinishFail => "finish-fail",
            Topic::ProductValidationSuccess => "product-validation-success",
            Topic::ProductValidationFail => "product-validation-fail",
            Topic::PaymentSuccess => "payment-success",
            Topic::PaymentFail => "payment-fail",
            Topic::InventorySuccess => "inventory-success",
            Topic::InventoryFail => "inventory-fail",
            Topic::NotifyEnding => "notify-ending",
        }
    }

    /// The topic on which a participant runs its forward action.
    ///
    /// Returns `None` for the orchestrator, which has no forward step.
    pub fn forward_for(source: EventSource) -> Option<Topic> {
        match source {
            EventSource::Orchestrator => None,
            EventSource::ProductValidation => Some(Topic::ProductValidationSuccess),
            EventSource::Payment => Some(Topic::PaymentSuccess),
            EventSource::Inventory => Some(Topic::InventorySuccess),
        }
    }

    /// The topic on which a participant runs its compensation.
    pub fn compensation_for(source: EventSource) -> Option<Topic> {
        match source {
            EventSource::Orchestrator => None,
            EventSource::ProductValidation => Some(Topic::ProductValidationFail),
            EventSource::Payment => Some(Topic::PaymentFail),
            EventSource::Inventory => Some(Topic::InventoryFail),
        }
    }

    /// Returns true for the topics that end a saga.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Topic::FinishSuccess | Topic::FinishFail)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Topic {
    type Err = SagaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| SagaError::validation(format!("Unknown topic: {s}")))
    }
}
