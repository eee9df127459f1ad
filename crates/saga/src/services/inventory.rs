//! Inventory participant.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SagaError};
use crate::event::Event;
use crate::participant::{SagaParticipant, StepMessages};
use crate::repository::{InMemoryRecordRepository, RecordRepository, SagaRecord};
use crate::status::EventSource;

const OUT_OF_STOCK: &str = "Product is out of stock!";

/// Stock level of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub product_code: String,
    pub available: u32,
}

/// Stock deducted from one product for one saga attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInventory {
    pub id: Uuid,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub product_code: String,
    pub order_quantity: u32,
    pub old_quantity: u32,
    pub new_quantity: u32,
    /// Set once the deducted quantity has been put back.
    pub compensated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord for OrderInventory {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }
}

/// Stock levels by product code.
#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn find_by_product_code(&self, code: &str) -> Result<Option<Inventory>>;

    async fn save(&self, inventory: Inventory) -> Result<Inventory>;
}

/// In-memory stock levels.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockRepository {
    stock: Arc<RwLock<HashMap<String, Inventory>>>,
}

impl InMemoryStockRepository {
    /// Creates an empty stock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stock holding the given (code, available) pairs.
    pub fn with_stock<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let stock = levels
            .into_iter()
            .map(|(code, available)| {
                let product_code = code.into();
                (
                    product_code.clone(),
                    Inventory {
                        product_code,
                        available,
                    },
                )
            })
            .collect();
        Self {
            stock: Arc::new(RwLock::new(stock)),
        }
    }

    /// Returns the available quantity of a product.
    pub async fn available(&self, code: &str) -> Option<u32> {
        self.stock.read().await.get(code).map(|i| i.available)
    }
}

#[async_trait]
impl StockRepository for InMemoryStockRepository {
    async fn find_by_product_code(&self, code: &str) -> Result<Option<Inventory>> {
        Ok(self.stock.read().await.get(code).cloned())
    }

    async fn save(&self, inventory: Inventory) -> Result<Inventory> {
        self.stock
            .write()
            .await
            .insert(inventory.product_code.clone(), inventory.clone());
        Ok(inventory)
    }
}

/// Deducts stock for orders and restores it on rollback.
#[derive(Debug, Clone, Default)]
pub struct InventoryService<
    S = InMemoryStockRepository,
    R = InMemoryRecordRepository<OrderInventory>,
> {
    stock: S,
    reservations: R,
}

impl<S, R> InventoryService<S, R>
where
    S: StockRepository,
    R: RecordRepository<OrderInventory>,
{
    /// Creates the service over a stock store and a reservation store.
    pub fn new(stock: S, reservations: R) -> Self {
        Self {
            stock,
            reservations,
        }
    }

    /// Returns the stock store.
    pub fn stock(&self) -> &S {
        &self.stock
    }

    /// Returns the reservation store.
    pub fn reservations(&self) -> &R {
        &self.reservations
    }

    async fn find_inventory(&self, code: &str) -> Result<Inventory> {
        self.stock
            .find_by_product_code(code)
            .await?
            .ok_or_else(|| {
                SagaError::validation(format!(
                    "Inventory not found by informed product: {code}"
                ))
            })
    }
}

#[async_trait]
impl<S, R> SagaParticipant for InventoryService<S, R>
where
    S: StockRepository,
    R: RecordRepository<OrderInventory>,
{
    fn source(&self) -> EventSource {
        EventSource::Inventory
    }

    fn messages(&self) -> StepMessages {
        StepMessages {
            success: "Inventory updated successfully.",
            failure: "Fail to update inventory",
            rollback_success: "Rollback executed for inventory!",
            rollback_failure: "Rollback not executed for inventory!",
        }
    }

    async fn is_processed(&self, event: &Event) -> Result<bool> {
        self.reservations
            .exists_by_order_and_transaction(&event.payload.id, &event.transaction_id)
            .await
    }

    /// Every line is checked before anything is deducted; repeated lines for
    /// the same product count against the same stock.
    async fn validate(&self, event: &Event) -> Result<()> {
        let mut requested: HashMap<&str, u32> = HashMap::new();
        for line in &event.payload.products {
            let code = line.product.code.as_str();
            let inventory = self.find_inventory(code).await?;
            let total = requested.entry(code).or_default();
            *total = total.saturating_add(line.quantity);
            if *total > inventory.available {
                return Err(SagaError::validation(OUT_OF_STOCK));
            }
        }
        Ok(())
    }

    async fn execute(&self, event: &mut Event) -> Result<()> {
        for line in &event.payload.products {
            let mut inventory = self.find_inventory(&line.product.code).await?;
            let old_quantity = inventory.available;
            let new_quantity = old_quantity
                .checked_sub(line.quantity)
                .ok_or_else(|| SagaError::validation(OUT_OF_STOCK))?;
            let now = Utc::now();

            self.reservations
                .save(OrderInventory {
                    id: Uuid::new_v4(),
                    order_id: event.payload.id.clone(),
                    transaction_id: event.transaction_id.clone(),
                    product_code: inventory.product_code.clone(),
                    order_quantity: line.quantity,
                    old_quantity,
                    new_quantity,
                    compensated: false,
                    created_at: now,
                    updated_at: now,
                })
                .await?;

            inventory.available = new_quantity;
            self.stock.save(inventory).await?;
        }
        Ok(())
    }

    /// Adds each reserved quantity back instead of restoring the old level,
    /// so stock taken by other transactions in between is preserved.
    async fn compensate(&self, event: &Event) -> Result<()> {
        let reservations = self
            .reservations
            .find_by_order_and_transaction(&event.payload.id, &event.transaction_id)
            .await?;

        for mut reservation in reservations.into_iter().filter(|r| !r.compensated) {
            let mut inventory = self.find_inventory(&reservation.product_code).await?;
            let before = inventory.available;
            inventory.available = before.saturating_add(reservation.order_quantity);
            let inventory = self.stock.save(inventory).await?;

            reservation.compensated = true;
            reservation.updated_at = Utc::now();
            self.reservations.save(reservation).await?;

            tracing::info!(
                product_code = %inventory.product_code,
                from = before,
                to = inventory.available,
                "restored inventory"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Order, OrderProducts, Product};

    fn service(levels: &[(&str, u32)]) -> InventoryService {
        InventoryService::new(
            InMemoryStockRepository::with_stock(levels.iter().map(|(c, q)| (*c, *q))),
            InMemoryRecordRepository::new(),
        )
    }

    fn event(lines: &[(&str, u32)]) -> Event {
        let lines = lines
            .iter()
            .map(|(code, qty)| OrderProducts::new(Product::new(*code, 1.0), *qty))
            .collect();
        Event::start(Order::new(lines), TransactionId::generate())
    }

    #[tokio::test]
    async fn test_reserve_deducts_and_records() {
        let service = service(&[("ABC", 5)]);
        let mut event = event(&[("ABC", 2)]);

        service.validate(&event).await.unwrap();
        service.execute(&mut event).await.unwrap();

        assert_eq!(service.stock().available("ABC").await, Some(3));
        let records = service.reservations().all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].old_quantity, 5);
        assert_eq!(records[0].order_quantity, 2);
        assert_eq!(records[0].new_quantity, 3);
        assert!(!records[0].compensated);
    }

    #[tokio::test]
    async fn test_out_of_stock_touches_nothing() {
        let service = service(&[("ABC", 5), ("XYZ", 1)]);
        let event = event(&[("ABC", 2), ("XYZ", 3)]);

        let err = service.validate(&event).await.unwrap_err();

        assert_eq!(err.to_string(), OUT_OF_STOCK);
        assert_eq!(service.stock().available("ABC").await, Some(5));
        assert!(service.reservations().is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_accumulated() {
        let service = service(&[("ABC", 5)]);
        let event = event(&[("ABC", 3), ("ABC", 3)]);

        let err = service.validate(&event).await.unwrap_err();
        assert_eq!(err.to_string(), OUT_OF_STOCK);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let service = service(&[("ABC", 5)]);
        let event = event(&[("NOPE", 1)]);

        let err = service.validate(&event).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Inventory not found by informed product: NOPE"
        );
    }

    #[tokio::test]
    async fn test_compensate_restores_only_own_quantity() {
        let service = service(&[("ABC", 10)]);
        let mut first = event(&[("ABC", 3)]);
        let mut second = event(&[("ABC", 4)]);
        service.execute(&mut first).await.unwrap();
        service.execute(&mut second).await.unwrap();
        assert_eq!(service.stock().available("ABC").await, Some(3));

        service.compensate(&first).await.unwrap();

        assert_eq!(service.stock().available("ABC").await, Some(6));
    }

    #[tokio::test]
    async fn test_compensate_twice_restores_once() {
        let service = service(&[("ABC", 5)]);
        let mut event = event(&[("ABC", 2)]);
        service.execute(&mut event).await.unwrap();

        service.compensate(&event).await.unwrap();
        service.compensate(&event).await.unwrap();

        assert_eq!(service.stock().available("ABC").await, Some(5));
        assert!(service.reservations().all().await[0].compensated);
    }

    #[tokio::test]
    async fn test_compensate_without_records_is_noop() {
        let service = service(&[("ABC", 5)]);
        let event = event(&[("ABC", 10)]);

        service.compensate(&event).await.unwrap();

        assert_eq!(service.stock().available("ABC").await, Some(5));
    }
}
