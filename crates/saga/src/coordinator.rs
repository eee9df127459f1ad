//! Saga orchestrator.

use broker::MessageBroker;
use chrono::Utc;
use common::TransactionId;

use crate::error::Result;
use crate::event::{Event, Order};
use crate::resolver::TopicResolver;
use crate::status::{EventSource, SagaStatus};
use crate::topic::Topic;

/// Drives order sagas by routing events between participants.
///
/// The orchestrator holds no per-saga state: everything it needs travels on
/// the event, and the next hop is always decided by the routing table. The
/// finish handlers are the exception, they publish to `notify-ending`
/// directly.
pub struct SagaOrchestrator<B: MessageBroker> {
    broker: B,
    resolver: TopicResolver,
}

impl<B: MessageBroker> SagaOrchestrator<B> {
    /// Creates an orchestrator using the order saga routing table.
    pub fn new(broker: B) -> Self {
        Self::with_resolver(broker, TopicResolver::default())
    }

    /// Creates an orchestrator with a custom resolver.
    pub fn with_resolver(broker: B, resolver: TopicResolver) -> Self {
        Self { broker, resolver }
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &TopicResolver {
        &self.resolver
    }

    /// Starts a new saga attempt for `order` and dispatches its first step.
    #[tracing::instrument(skip_all, fields(order_id = %order.id))]
    pub async fn start_saga(&self, order: Order) -> Result<Event> {
        let mut event = Event::start(order, TransactionId::generate());
        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga started!");

        let topic = self.resolver.resolve(&event)?;
        tracing::info!(transaction_id = %event.transaction_id, %topic, "saga started");

        self.publish(topic, &event).await?;
        metrics::counter!("saga_started_total").increment(1);
        Ok(event)
    }

    /// Forwards `event` to the topic chosen by its current source and status.
    ///
    /// The event is published unchanged; resolution errors abort the message.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %event.payload.id, transaction_id = %event.transaction_id)
    )]
    pub async fn continue_saga(&self, event: &Event) -> Result<Topic> {
        let topic = self.resolver.resolve(event)?;
        self.publish(topic, event).await?;
        Ok(topic)
    }

    /// Closes a saga that reached the end of the forward path.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %event.payload.id, transaction_id = %event.transaction_id)
    )]
    pub async fn finish_saga_success(&self, event: Event) -> Result<Event> {
        self.finish(event, SagaStatus::Success, "Saga finished successfully!")
            .await
    }

    /// Closes a saga whose compensation has unwound every participant.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %event.payload.id, transaction_id = %event.transaction_id)
    )]
    pub async fn finish_saga_fail(&self, event: Event) -> Result<Event> {
        self.finish(event, SagaStatus::Fail, "Saga finished with errors!")
            .await
    }

    async fn finish(&self, mut event: Event, status: SagaStatus, message: &str) -> Result<Event> {
        event.record(EventSource::Orchestrator, status, message);
        self.publish(Topic::NotifyEnding, &event).await?;

        let outcome = match status {
            SagaStatus::Success => "success",
            SagaStatus::Fail | SagaStatus::RollbackPending => "fail",
        };
        let elapsed = (Utc::now() - event.created_at).to_std().unwrap_or_default();
        metrics::counter!("saga_finished_total", "outcome" => outcome).increment(1);
        metrics::histogram!("saga_duration_seconds", "outcome" => outcome)
            .record(elapsed.as_secs_f64());

        tracing::info!(saga_id = %event.log_id(), outcome, "saga finished");
        Ok(event)
    }

    async fn publish(&self, topic: Topic, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.broker.send(topic.as_str(), payload).await?;
        Ok(())
    }
}
