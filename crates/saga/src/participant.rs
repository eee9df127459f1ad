//! The generic saga participant step.
//!
//! Every participant follows the same pattern on its forward topic:
//!
//! 1. idempotency check on (orderId, transactionId)
//! 2. domain preconditions
//! 3. domain action + participant record
//! 4. outcome classification (SUCCESS or ROLLBACK_PENDING, plus history)
//! 5. unconditional republish to the orchestrator
//!
//! and the same pattern on its compensation topic: mark FAIL, reverse the
//! recorded side effect, record the result, republish. [`StepExecutor`]
//! implements both once; a [`SagaParticipant`] only supplies the domain parts.

use async_trait::async_trait;
use broker::MessageBroker;

use crate::error::{Result, SagaError};
use crate::event::Event;
use crate::status::{EventSource, SagaStatus};
use crate::topic::Topic;

/// Raised when a participant already holds a record for the saga attempt.
pub const DUPLICATE_TRANSACTION: &str = "There's another transactionID for this validation.";

/// History messages written by a participant.
#[derive(Debug, Clone, Copy)]
pub struct StepMessages {
    /// Appended when the forward action succeeds.
    pub success: &'static str,
    /// Prefix of the entry appended when the forward action fails.
    pub failure: &'static str,
    /// Appended when compensation succeeds.
    pub rollback_success: &'static str,
    /// Prefix of the entry appended when compensation fails.
    pub rollback_failure: &'static str,
}

/// The domain-specific half of a saga participant.
#[async_trait]
pub trait SagaParticipant: Send + Sync {
    /// The identity stamped on events this participant writes.
    fn source(&self) -> EventSource;

    /// History messages for this participant.
    fn messages(&self) -> StepMessages;

    /// Returns true if a record already exists for the event's saga attempt.
    async fn is_processed(&self, event: &Event) -> Result<bool>;

    /// Checks domain preconditions before any side effect.
    async fn validate(&self, _event: &Event) -> Result<()> {
        Ok(())
    }

    /// Performs the forward action and persists the participant record.
    async fn execute(&self, event: &mut Event) -> Result<()>;

    /// Reverses the side effect recorded for the event's saga attempt.
    async fn compensate(&self, event: &Event) -> Result<()>;
}

/// Result of running a step: the republished event, and the error that
/// was folded into it, if any.
#[derive(Debug)]
pub struct StepOutcome {
    pub event: Event,
    pub failure: Option<SagaError>,
}

impl StepOutcome {
    /// Returns true if the step completed without error.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs a participant's forward and compensation paths against the broker.
pub struct StepExecutor<P, B> {
    participant: P,
    broker: B,
}

impl<P, B> StepExecutor<P, B>
where
    P: SagaParticipant,
    B: MessageBroker,
{
    /// Creates an executor for `participant` publishing through `broker`.
    pub fn new(participant: P, broker: B) -> Self {
        Self {
            participant,
            broker,
        }
    }

    /// Returns the wrapped participant.
    pub fn participant(&self) -> &P {
        &self.participant
    }

    /// Topics this executor consumes: the forward and compensation topics.
    pub fn topics(&self) -> Vec<Topic> {
        let source = self.participant.source();
        Topic::forward_for(source)
            .into_iter()
            .chain(Topic::compensation_for(source))
            .collect()
    }

    /// Runs the forward step.
    ///
    /// Domain failures never escape: they are recorded on the event as
    /// ROLLBACK_PENDING and returned in [`StepOutcome::failure`]. Only a
    /// failure to republish is returned as an error.
    #[tracing::instrument(
        skip_all,
        fields(source = %self.participant.source(), order_id = %event.payload.id, transaction_id = %event.transaction_id)
    )]
    pub async fn run_step(&self, mut event: Event) -> Result<StepOutcome> {
        let source = self.participant.source();
        let messages = self.participant.messages();

        let failure = match self.forward(&mut event).await {
            Ok(()) => {
                event.record(source, SagaStatus::Success, messages.success);
                tracing::info!("saga step succeeded");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "saga step failed");
                event.record(
                    source,
                    SagaStatus::RollbackPending,
                    format!("{}: {}", messages.failure, e),
                );
                Some(e)
            }
        };

        let outcome = if failure.is_none() { "success" } else { "failure" };
        metrics::counter!("saga_steps_total", "source" => source.as_str(), "outcome" => outcome)
            .increment(1);

        self.publish(&event).await?;
        Ok(StepOutcome { event, failure })
    }

    /// Runs the compensation step.
    ///
    /// A failed reversal is recorded on the event and reported as
    /// [`SagaError::Compensation`]; the event is republished either way.
    #[tracing::instrument(
        skip_all,
        fields(source = %self.participant.source(), order_id = %event.payload.id, transaction_id = %event.transaction_id)
    )]
    pub async fn run_compensation(&self, mut event: Event) -> Result<StepOutcome> {
        let source = self.participant.source();
        let messages = self.participant.messages();

        let failure = match self.participant.compensate(&event).await {
            Ok(()) => {
                event.record(source, SagaStatus::Fail, messages.rollback_success);
                tracing::info!("compensation executed");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "compensation not executed");
                event.record(
                    source,
                    SagaStatus::Fail,
                    format!("{}: {}", messages.rollback_failure, e),
                );
                Some(SagaError::Compensation {
                    participant: source,
                    reason: e.to_string(),
                })
            }
        };

        let outcome = if failure.is_none() { "success" } else { "failure" };
        metrics::counter!("saga_compensations_total", "source" => source.as_str(), "outcome" => outcome)
            .increment(1);

        self.publish(&event).await?;
        Ok(StepOutcome { event, failure })
    }

    async fn forward(&self, event: &mut Event) -> Result<()> {
        if self.participant.is_processed(event).await? {
            return Err(SagaError::validation(DUPLICATE_TRANSACTION));
        }
        self.participant.validate(event).await?;
        self.participant.execute(event).await
    }

    async fn publish(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.broker
            .send(Topic::Orchestrator.as_str(), payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Order, OrderProducts, Product};
    use broker::InMemoryBroker;
    use common::TransactionId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails on demand.
    #[derive(Default)]
    struct ScriptedStep {
        processed: bool,
        fail_validate: bool,
        fail_compensate: bool,
        executed: AtomicUsize,
    }

    #[async_trait]
    impl SagaParticipant for ScriptedStep {
        fn source(&self) -> EventSource {
            EventSource::Payment
        }

        fn messages(&self) -> StepMessages {
            StepMessages {
                success: "done",
                failure: "not done",
                rollback_success: "undone",
                rollback_failure: "not undone",
            }
        }

        async fn is_processed(&self, _event: &Event) -> Result<bool> {
            Ok(self.processed)
        }

        async fn validate(&self, _event: &Event) -> Result<()> {
            if self.fail_validate {
                return Err(SagaError::validation("bad input"));
            }
            Ok(())
        }

        async fn execute(&self, _event: &mut Event) -> Result<()> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn compensate(&self, _event: &Event) -> Result<()> {
            if self.fail_compensate {
                return Err(SagaError::validation("nothing to undo"));
            }
            Ok(())
        }
    }

    fn event() -> Event {
        let order = Order::new(vec![OrderProducts::new(Product::new("ABC", 1.0), 1)]);
        let mut event = Event::start(order, TransactionId::generate());
        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga started!");
        event
    }

    #[tokio::test]
    async fn test_success_is_recorded_and_published() {
        let broker = InMemoryBroker::with_log();
        let executor = StepExecutor::new(ScriptedStep::default(), broker.clone());

        let outcome = executor.run_step(event()).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.event.source, Some(EventSource::Payment));
        assert_eq!(outcome.event.status, Some(SagaStatus::Success));
        assert_eq!(outcome.event.history().len(), 2);
        assert_eq!(outcome.event.last_history().unwrap().message, "done");

        let published = broker.messages("orchestrator").await;
        assert_eq!(published.len(), 1);
        let decoded: Event = published[0].decode().unwrap();
        assert_eq!(decoded, outcome.event);
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected_without_executing() {
        let broker = InMemoryBroker::with_log();
        let step = ScriptedStep {
            processed: true,
            ..ScriptedStep::default()
        };
        let executor = StepExecutor::new(step, broker.clone());

        let outcome = executor.run_step(event()).await.unwrap();

        assert!(matches!(&outcome.failure, Some(SagaError::Validation(m)) if m == DUPLICATE_TRANSACTION));
        assert_eq!(executor.participant().executed.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.event.status, Some(SagaStatus::RollbackPending));
        assert_eq!(
            outcome.event.last_history().unwrap().message,
            format!("not done: {DUPLICATE_TRANSACTION}")
        );
        assert_eq!(broker.messages("orchestrator").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_validation_is_still_published() {
        let broker = InMemoryBroker::with_log();
        let step = ScriptedStep {
            fail_validate: true,
            ..ScriptedStep::default()
        };
        let executor = StepExecutor::new(step, broker.clone());

        let outcome = executor.run_step(event()).await.unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.event.source, Some(EventSource::Payment));
        assert_eq!(outcome.event.status, Some(SagaStatus::RollbackPending));
        assert_eq!(executor.participant().executed.load(Ordering::SeqCst), 0);
        assert_eq!(broker.messages("orchestrator").await.len(), 1);
    }

    #[tokio::test]
    async fn test_compensation_marks_fail() {
        let broker = InMemoryBroker::with_log();
        let executor = StepExecutor::new(ScriptedStep::default(), broker.clone());

        let outcome = executor.run_compensation(event()).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.event.status, Some(SagaStatus::Fail));
        assert_eq!(outcome.event.source, Some(EventSource::Payment));
        assert_eq!(outcome.event.last_history().unwrap().message, "undone");
        assert_eq!(broker.messages("orchestrator").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_compensation_is_surfaced_not_dropped() {
        let broker = InMemoryBroker::with_log();
        let step = ScriptedStep {
            fail_compensate: true,
            ..ScriptedStep::default()
        };
        let executor = StepExecutor::new(step, broker.clone());

        let outcome = executor.run_compensation(event()).await.unwrap();

        assert!(matches!(
            outcome.failure,
            Some(SagaError::Compensation { participant: EventSource::Payment, .. })
        ));
        assert_eq!(outcome.event.status, Some(SagaStatus::Fail));
        assert_eq!(
            outcome.event.last_history().unwrap().message,
            "not undone: nothing to undo"
        );
        assert_eq!(broker.messages("orchestrator").await.len(), 1);
    }

    #[test]
    fn test_topics() {
        let executor = StepExecutor::new(ScriptedStep::default(), InMemoryBroker::with_log());
        assert_eq!(executor.topics(), vec![Topic::PaymentSuccess, Topic::PaymentFail]);
    }
}
