//! Saga history: records finished sagas and answers queries about them.

use chrono::Utc;
use common::{OrderId, TransactionId};
use saga::Event;
use serde::Deserialize;

use crate::error::ApiError;
use crate::repository::EventRepository;

/// Query filters for `GET /api/event`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
}

fn informed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Records finished sagas and looks them up.
pub struct HistoryService<R: EventRepository> {
    repository: R,
}

impl<R: EventRepository> HistoryService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Stores the final event of a saga.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %event.order_id, transaction_id = %event.transaction_id)
    )]
    pub async fn notify_ending(&self, mut event: Event) -> Result<Event, ApiError> {
        event.created_at = Utc::now();
        self.repository.save(&event).await?;

        tracing::info!(status = ?event.status, "order notified");
        Ok(event)
    }

    /// Returns every recorded saga, newest first.
    pub async fn find_all(&self) -> Result<Vec<Event>, ApiError> {
        Ok(self.repository.find_all().await?)
    }

    /// Returns the newest event matching the filters.
    ///
    /// The order id wins when both filters are given.
    pub async fn find_by_filters(&self, filters: &EventFilters) -> Result<Event, ApiError> {
        if let Some(order_id) = informed(&filters.order_id) {
            return self
                .repository
                .find_latest_by_order_id(&OrderId::new(order_id))
                .await?
                .ok_or_else(|| ApiError::NotFound("Event not found by orderID.".to_string()));
        }

        if let Some(transaction_id) = informed(&filters.transaction_id) {
            return self
                .repository
                .find_latest_by_transaction_id(&TransactionId::new(transaction_id))
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound("Event not found by transactionID.".to_string())
                });
        }

        Err(ApiError::BadRequest(
            "OrderID or TransactionID must be informed.".to_string(),
        ))
    }
}
