//! Payment participant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SagaError};
use crate::event::{Event, Order};
use crate::participant::{SagaParticipant, StepMessages};
use crate::repository::{InMemoryRecordRepository, RecordRepository, SagaRecord};
use crate::status::EventSource;

/// Smallest order amount accepted when no other minimum is configured.
pub const DEFAULT_MIN_AMOUNT: f64 = 0.1;

/// Raised when the ordered quantities add up past `u32::MAX`.
pub const TOO_MANY_ITEMS: &str = "The total quantity of items is too large!";

/// Lifecycle of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Refund,
}

/// A payment taken for one saga attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub total_items: u32,
    pub total_amount: f64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord for Payment {
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

/// Payment rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentSettings {
    /// Orders below this amount are rejected.
    pub min_amount: f64,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            min_amount: DEFAULT_MIN_AMOUNT,
        }
    }
}

/// Sum of `quantity * unit_value` over every line.
pub fn total_amount(order: &Order) -> f64 {
    order
        .products
        .iter()
        .map(|line| f64::from(line.quantity) * line.product.unit_value)
        .sum()
}

/// Sum of quantities over every line.
///
/// Fails when the sum does not fit in a `u32`.
pub fn total_items(order: &Order) -> Result<u32> {
    order
        .products
        .iter()
        .try_fold(0u32, |total, line| total.checked_add(line.quantity))
        .ok_or_else(|| SagaError::validation(TOO_MANY_ITEMS))
}

/// Charges orders and refunds them on rollback.
#[derive(Debug, Clone, Default)]
pub struct PaymentService<R = InMemoryRecordRepository<Payment>> {
    payments: R,
    settings: PaymentSettings,
}

impl<R: RecordRepository<Payment>> PaymentService<R> {
    /// Creates the service with default settings.
    pub fn new(payments: R) -> Self {
        Self::with_settings(payments, PaymentSettings::default())
    }

    /// Creates the service with explicit settings.
    pub fn with_settings(payments: R, settings: PaymentSettings) -> Self {
        Self { payments, settings }
    }

    /// Returns the payment store.
    pub fn payments(&self) -> &R {
        &self.payments
    }

    fn check_amount(&self, amount: f64) -> Result<()> {
        if amount < self.settings.min_amount {
            return Err(SagaError::validation(format!(
                "The minimum amount available is {}",
                self.settings.min_amount
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<R: RecordRepository<Payment>> SagaParticipant for PaymentService<R> {
    fn source(&self) -> EventSource {
        EventSource::Payment
    }

    fn messages(&self) -> StepMessages {
        StepMessages {
            success: "Payment realized successfully.",
            failure: "Fail to realize payment",
            rollback_success: "Rollback executed for payment!",
            rollback_failure: "Rollback not executed for payment!",
        }
    }

    async fn is_processed(&self, event: &Event) -> Result<bool> {
        self.payments
            .exists_by_order_and_transaction(&event.payload.id, &event.transaction_id)
            .await
    }

    async fn execute(&self, event: &mut Event) -> Result<()> {
        let amount = total_amount(&event.payload);
        let items = total_items(&event.payload)?;
        let now = Utc::now();

        // The pending record is kept even if the amount check fails below.
        let mut payment = self
            .payments
            .save(Payment {
                id: Uuid::new_v4(),
                order_id: event.payload.id.clone(),
                transaction_id: event.transaction_id.clone(),
                total_items: items,
                total_amount: amount,
                status: PaymentStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await?;

        event.payload.total_amount = amount;
        event.payload.total_items = items;

        self.check_amount(amount)?;

        payment.status = PaymentStatus::Success;
        payment.updated_at = Utc::now();
        self.payments.save(payment).await?;

        tracing::info!(total_amount = amount, total_items = items, "payment realized");
        Ok(())
    }

    async fn compensate(&self, event: &Event) -> Result<()> {
        let mut payment = self
            .payments
            .find_by_order_and_transaction(&event.payload.id, &event.transaction_id)
            .await?
            .pop()
            .ok_or_else(|| {
                SagaError::validation("Payment not found by OrderID and TransactionID!")
            })?;

        payment.status = PaymentStatus::Refund;
        payment.updated_at = Utc::now();
        let refunded = self.payments.save(payment).await?;

        tracing::info!(total_amount = refunded.total_amount, "payment refunded");
        Ok(())
    }
}
