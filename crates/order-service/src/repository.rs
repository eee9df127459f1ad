//! Storage for finished saga events.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, TransactionId};
use saga::Event;
use tokio::sync::RwLock;

use crate::error::StoreResult;

/// Stores the final event of each saga, as delivered on `notify-ending`.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Inserts the event, or replaces the stored one with the same id.
    async fn save(&self, event: &Event) -> StoreResult<()>;

    /// Returns every stored event, newest first.
    async fn find_all(&self) -> StoreResult<Vec<Event>>;

    /// Returns the newest event of an order.
    async fn find_latest_by_order_id(&self, order_id: &OrderId) -> StoreResult<Option<Event>>;

    /// Returns the newest event of a saga attempt.
    async fn find_latest_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> StoreResult<Option<Event>>;
}

/// In-memory event repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventRepository {
    events: Arc<RwLock<Vec<Event>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns true if no event is stored.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    async fn latest_where(&self, predicate: impl Fn(&Event) -> bool) -> Option<Event> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| predicate(e))
            .max_by_key(|e| e.created_at)
            .cloned()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn save(&self, event: &Event) -> StoreResult<()> {
        let mut events = self.events.write().await;
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }
        Ok(())
    }

    async fn find_all(&self) -> StoreResult<Vec<Event>> {
        let mut events = self.events.read().await.clone();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn find_latest_by_order_id(&self, order_id: &OrderId) -> StoreResult<Option<Event>> {
        Ok(self.latest_where(|e| &e.order_id == order_id).await)
    }

    async fn find_latest_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> StoreResult<Option<Event>> {
        Ok(self
            .latest_where(|e| &e.transaction_id == transaction_id)
            .await)
    }
}
