//! The event envelope carried on every saga topic.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::status::{EventSource, SagaStatus};

/// A product referenced by an order line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product code (SKU).
    #[serde(default)]
    pub code: String,
    /// Price of a single unit.
    #[serde(default)]
    pub unit_value: f64,
}

impl Product {
    /// Creates a product reference.
    pub fn new(code: impl Into<String>, unit_value: f64) -> Self {
        Self {
            code: code.into(),
            unit_value,
        }
    }
}

/// One ordered line: a product and how many units of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderProducts {
    #[serde(default)]
    pub product: Product,
    #[serde(default)]
    pub quantity: u32,
}

impl OrderProducts {
    /// Creates an order line.
    pub fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }
}

/// The order snapshot travelling inside every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: OrderId,
    /// Saga attempt that currently owns this snapshot.
    #[serde(default)]
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub products: Vec<OrderProducts>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Filled in by the payment step.
    #[serde(default)]
    pub total_amount: f64,
    /// Filled in by the payment step.
    #[serde(default)]
    pub total_items: u32,
}

impl Order {
    /// Creates a new order with a generated id.
    pub fn new(products: Vec<OrderProducts>) -> Self {
        Self {
            id: OrderId::generate(),
            products,
            created_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// One audit entry on an event's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub source: EventSource,
    pub status: SagaStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// The saga's unit of work in flight.
///
/// Everything except `history` may be rewritten by whoever holds the event;
/// `history` is append-only and can only grow through [`Event::record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: EventId,
    #[serde(default)]
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub order_id: OrderId,
    pub payload: Order,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub status: Option<SagaStatus>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl Event {
    /// Creates a fresh event for a saga attempt over `order`.
    ///
    /// The transaction id is written to both the event and the order snapshot.
    pub fn start(mut order: Order, transaction_id: TransactionId) -> Self {
        order.transaction_id = transaction_id.clone();
        Self {
            id: EventId::new(),
            transaction_id,
            order_id: order.id.clone(),
            payload: order,
            source: None,
            status: None,
            created_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Stamps the writer and outcome, then appends a history entry for them.
    pub fn record(&mut self, source: EventSource, status: SagaStatus, message: impl Into<String>) {
        self.source = Some(source);
        self.status = Some(status);
        self.history.push(HistoryEntry {
            source,
            status,
            message: message.into(),
            created_at: Utc::now(),
        });
    }

    /// Returns the audit trail, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Returns the most recent history entry.
    pub fn last_history(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Identifies this event in logs.
    pub fn log_id(&self) -> String {
        format!(
            "ORDER ID: {} | TRANSACTION ID: {} | EVENT ID: {}",
            self.payload.id, self.transaction_id, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::new(vec![OrderProducts::new(Product::new("ABC", 10.0), 2)])
    }

    #[test]
    fn test_start_propagates_transaction_id() {
        let order = sample_order();
        let order_id = order.id.clone();
        let event = Event::start(order, TransactionId::new("1_tx"));

        assert_eq!(event.order_id, order_id);
        assert_eq!(event.transaction_id.as_str(), "1_tx");
        assert_eq!(event.payload.transaction_id.as_str(), "1_tx");
        assert!(event.source.is_none());
        assert!(event.status.is_none());
        assert!(event.history().is_empty());
    }

    #[test]
    fn test_record_appends_and_stamps() {
        let mut event = Event::start(sample_order(), TransactionId::generate());

        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga started!");
        let first = event.history()[0].clone();
        event.record(EventSource::Payment, SagaStatus::RollbackPending, "declined");

        assert_eq!(event.source, Some(EventSource::Payment));
        assert_eq!(event.status, Some(SagaStatus::RollbackPending));
        assert_eq!(event.history().len(), 2);
        assert_eq!(event.history()[0], first);
        assert_eq!(event.last_history().unwrap().message, "declined");
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let mut event = Event::start(sample_order(), TransactionId::new("1_tx"));
        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga started!");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["transactionId"], "1_tx");
        assert_eq!(json["source"], "ORCHESTRATOR");
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["payload"]["products"][0]["product"]["code"], "ABC");
        assert_eq!(json["payload"]["products"][0]["product"]["unitValue"], 10.0);
        assert_eq!(json["payload"]["products"][0]["quantity"], 2);
        assert_eq!(json["history"][0]["message"], "Saga started!");
        assert!(json["history"][0]["createdAt"].is_string());
    }

    #[test]
    fn test_deserialize_ignores_unknown_and_tolerates_missing_status() {
        let json = r#"{
            "id": "6f1c2a7e-3b0f-4c7e-9a55-3f7f2d8e1b11",
            "transactionId": "1_tx",
            "orderId": "order-1",
            "payload": {"id": "order-1", "products": [{"product": {"code": "ABC", "unitValue": 10.0}, "quantity": 2}]},
            "createdAt": "2024-01-01T00:00:00Z",
            "somethingElse": 42
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.order_id.as_str(), "order-1");
        assert!(event.source.is_none());
        assert!(event.status.is_none());
        assert!(event.history().is_empty());
        assert_eq!(event.payload.products[0].quantity, 2);
    }

    #[test]
    fn test_history_survives_serialization() {
        let mut event = Event::start(sample_order(), TransactionId::generate());
        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga started!");
        event.record(EventSource::ProductValidation, SagaStatus::Success, "ok");

        let json = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.history(), event.history());
    }

    #[test]
    fn test_log_id_format() {
        let event = Event::start(sample_order(), TransactionId::new("1_tx"));
        let log_id = event.log_id();
        assert!(log_id.starts_with(&format!("ORDER ID: {}", event.payload.id)));
        assert!(log_id.contains("TRANSACTION ID: 1_tx"));
        assert!(log_id.ends_with(&event.id.to_string()));
    }
}
