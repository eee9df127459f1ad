//! Participant record storage.
//!
//! Each participant keeps its own records keyed by (orderId, transactionId).
//! Those records are what makes the participant steps idempotent and what
//! compensation reverses.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, TransactionId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// A record a participant persists for one saga attempt.
pub trait SagaRecord: Clone + Send + Sync + 'static {
    /// Unique id of the record itself.
    fn id(&self) -> Uuid;
    fn order_id(&self) -> &OrderId;
    fn transaction_id(&self) -> &TransactionId;

    /// Returns true if the record belongs to the given saga attempt.
    fn belongs_to(&self, order_id: &OrderId, transaction_id: &TransactionId) -> bool {
        self.order_id() == order_id && self.transaction_id() == transaction_id
    }
}

/// Storage for one participant's records.
#[async_trait]
pub trait RecordRepository<R: SagaRecord>: Send + Sync {
    /// Returns true if any record exists for the saga attempt.
    async fn exists_by_order_and_transaction(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<bool>;

    /// Inserts the record, or replaces the stored one with the same id.
    async fn save(&self, record: R) -> Result<R>;

    /// Returns every record of the saga attempt, in insertion order.
    async fn find_by_order_and_transaction(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Vec<R>>;
}

/// In-memory record repository.
#[derive(Debug, Clone)]
pub struct InMemoryRecordRepository<R> {
    records: Arc<RwLock<Vec<R>>>,
}

impl<R> Default for InMemoryRecordRepository<R> {
    fn default() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<R: SagaRecord> InMemoryRecordRepository<R> {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no record is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Returns a snapshot of every stored record.
    pub async fn all(&self) -> Vec<R> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl<R: SagaRecord> RecordRepository<R> for InMemoryRecordRepository<R> {
    async fn exists_by_order_and_transaction(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .any(|r| r.belongs_to(order_id, transaction_id)))
    }

    async fn save(&self, record: R) -> Result<R> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }

    async fn find_by_order_and_transaction(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Vec<R>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.belongs_to(order_id, transaction_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: Uuid,
        order_id: OrderId,
        transaction_id: TransactionId,
        text: &'static str,
    }

    impl SagaRecord for Note {
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

    fn note(order: &str, tx: &str, text: &'static str) -> Note {
        Note {
            id: Uuid::new_v4(),
            order_id: OrderId::new(order),
            transaction_id: TransactionId::new(tx),
            text,
        }
    }

    #[tokio::test]
    async fn test_exists_is_scoped_to_order_and_transaction() {
        let repo = InMemoryRecordRepository::new();
        repo.save(note("o1", "t1", "a")).await.unwrap();

        let o1 = OrderId::new("o1");
        assert!(repo.exists_by_order_and_transaction(&o1, &TransactionId::new("t1")).await.unwrap());
        assert!(!repo.exists_by_order_and_transaction(&o1, &TransactionId::new("t2")).await.unwrap());
        assert!(
            !repo
                .exists_by_order_and_transaction(&OrderId::new("o2"), &TransactionId::new("t1"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_replaces_same_id() {
        let repo = InMemoryRecordRepository::new();
        let mut first = repo.save(note("o1", "t1", "a")).await.unwrap();
        repo.save(note("o1", "t1", "b")).await.unwrap();

        first.text = "updated";
        repo.save(first.clone()).await.unwrap();

        let found = repo
            .find_by_order_and_transaction(&OrderId::new("o1"), &TransactionId::new("t1"))
            .await
            .unwrap();
        assert_eq!(repo.len().await, 2);
        assert_eq!(found[0], first);
        assert_eq!(found[1].text, "b");
    }
}
