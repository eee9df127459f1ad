//! Product validation participant.

use std::collections::HashSet;
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

/// Outcome of validating one saga attempt's products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub id: Uuid,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Validation {
    fn new(order_id: OrderId, transaction_id: TransactionId, success: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            transaction_id,
            success,
            created_at: now,
            updated_at: now,
        }
    }
}

impl SagaRecord for Validation {
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

/// Lookup of known product codes.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns true if the product code is known.
    async fn exists_by_code(&self, code: &str) -> Result<bool>;
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    codes: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryProductCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given codes.
    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Arc::new(RwLock::new(codes.into_iter().map(Into::into).collect())),
        }
    }

    /// Adds a product code.
    pub async fn insert(&self, code: impl Into<String>) {
        self.codes.write().await.insert(code.into());
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn exists_by_code(&self, code: &str) -> Result<bool> {
        Ok(self.codes.read().await.contains(code))
    }
}

/// Checks that an order only references known products.
#[derive(Debug, Clone, Default)]
pub struct ProductValidationService<
    C = InMemoryProductCatalog,
    R = InMemoryRecordRepository<Validation>,
> {
    catalog: C,
    validations: R,
}

impl<C, R> ProductValidationService<C, R>
where
    C: ProductCatalog,
    R: RecordRepository<Validation>,
{
    /// Creates the service over a catalog and a validation store.
    pub fn new(catalog: C, validations: R) -> Self {
        Self {
            catalog,
            validations,
        }
    }

    /// Returns the validation store.
    pub fn validations(&self) -> &R {
        &self.validations
    }
}

#[async_trait]
impl<C, R> SagaParticipant for ProductValidationService<C, R>
where
    C: ProductCatalog,
    R: RecordRepository<Validation>,
{
    fn source(&self) -> EventSource {
        EventSource::ProductValidation
    }

    fn messages(&self) -> StepMessages {
        StepMessages {
            success: "Product successfully validated.",
            failure: "Fail to validate product",
            rollback_success: "Rollback executed for product validation!",
            rollback_failure: "Rollback not executed for product validation",
        }
    }

    async fn is_processed(&self, event: &Event) -> Result<bool> {
        self.validations
            .exists_by_order_and_transaction(&event.payload.id, &event.transaction_id)
            .await
    }

    async fn validate(&self, event: &Event) -> Result<()> {
        let order = &event.payload;
        if order.products.is_empty() {
            return Err(SagaError::validation("Product list is empty."));
        }
        if order.id.is_empty() || event.transaction_id.is_empty() {
            return Err(SagaError::validation(
                "OrderID or TransactionID must be informed!",
            ));
        }
        for line in &order.products {
            let code = line.product.code.trim();
            if code.is_empty() {
                return Err(SagaError::validation("Product must be informed!"));
            }
            if !self.catalog.exists_by_code(code).await? {
                return Err(SagaError::validation(
                    "Product does not exists in database!",
                ));
            }
        }
        Ok(())
    }

    async fn execute(&self, event: &mut Event) -> Result<()> {
        let validation = Validation::new(
            event.payload.id.clone(),
            event.transaction_id.clone(),
            true,
        );
        self.validations.save(validation).await?;
        Ok(())
    }

    async fn compensate(&self, event: &Event) -> Result<()> {
        let existing = self
            .validations
            .find_by_order_and_transaction(&event.payload.id, &event.transaction_id)
            .await?;

        if existing.is_empty() {
            let validation = Validation::new(
                event.payload.id.clone(),
                event.transaction_id.clone(),
                false,
            );
            self.validations.save(validation).await?;
            return Ok(());
        }

        for mut validation in existing {
            validation.success = false;
            validation.updated_at = Utc::now();
            self.validations.save(validation).await?;
        }
        Ok(())
    }
}
