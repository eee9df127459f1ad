//! Broker handlers binding the orchestrator and participants to their topics.

use async_trait::async_trait;
use broker::{BrokerError, Message, MessageBroker, MessageHandler};

use crate::coordinator::SagaOrchestrator;
use crate::error::SagaError;
use crate::event::{Event, Order};
use crate::participant::{SagaParticipant, StepExecutor};
use crate::topic::Topic;

fn handler_error(message: &Message, error: SagaError) -> BrokerError {
    match error {
        SagaError::Transport(e) => e,
        other => BrokerError::handler(message.topic.clone(), other),
    }
}

fn parse_topic(message: &Message) -> Result<Topic, BrokerError> {
    message
        .topic
        .parse()
        .map_err(|_| BrokerError::NoHandler(message.topic.clone()))
}

/// Consumes `start-saga`, `orchestrator`, `finish-success` and `finish-fail`.
pub struct OrchestratorHandler<B: MessageBroker> {
    orchestrator: SagaOrchestrator<B>,
}

impl<B: MessageBroker> OrchestratorHandler<B> {
    pub fn new(orchestrator: SagaOrchestrator<B>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl<B: MessageBroker> MessageHandler for OrchestratorHandler<B> {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    fn topics(&self) -> Vec<String> {
        [
            Topic::StartSaga,
            Topic::Orchestrator,
            Topic::FinishSuccess,
            Topic::FinishFail,
        ]
        .iter()
        .map(|t| t.as_str().to_string())
        .collect()
    }

    async fn handle(&self, message: &Message) -> broker::Result<()> {
        let result = match parse_topic(message)? {
            Topic::StartSaga => {
                let order: Order = message.decode()?;
                self.orchestrator.start_saga(order).await.map(|_| ())
            }
            Topic::Orchestrator => {
                let event: Event = message.decode()?;
                self.orchestrator.continue_saga(&event).await.map(|_| ())
            }
            Topic::FinishSuccess => {
                let event: Event = message.decode()?;
                self.orchestrator.finish_saga_success(event).await.map(|_| ())
            }
            Topic::FinishFail => {
                let event: Event = message.decode()?;
                self.orchestrator.finish_saga_fail(event).await.map(|_| ())
            }
            _ => return Err(BrokerError::NoHandler(message.topic.clone())),
        };
        result.map_err(|e| handler_error(message, e))
    }
}

/// Consumes a participant's forward and compensation topics.
pub struct ParticipantHandler<P, B> {
    executor: StepExecutor<P, B>,
}

impl<P, B> ParticipantHandler<P, B>
where
    P: SagaParticipant,
    B: MessageBroker,
{
    pub fn new(participant: P, broker: B) -> Self {
        Self {
            executor: StepExecutor::new(participant, broker),
        }
    }

    /// Returns the wrapped participant.
    pub fn participant(&self) -> &P {
        self.executor.participant()
    }
}

#[async_trait]
impl<P, B> MessageHandler for ParticipantHandler<P, B>
where
    P: SagaParticipant + 'static,
    B: MessageBroker + 'static,
{
    fn name(&self) -> &'static str {
        self.executor.participant().source().as_str()
    }

    fn topics(&self) -> Vec<String> {
        self.executor
            .topics()
            .into_iter()
            .map(|t| t.as_str().to_string())
            .collect()
    }

    async fn handle(&self, message: &Message) -> broker::Result<()> {
        let topic = parse_topic(message)?;
        let source = self.executor.participant().source();
        let event: Event = message.decode()?;

        if Some(topic) == Topic::forward_for(source) {
            let outcome = self
                .executor
                .run_step(event)
                .await
                .map_err(|e| handler_error(message, e))?;
            if let Some(failure) = outcome.failure {
                // Recorded on the event and routed to compensation.
                tracing::warn!(%source, error = %failure, "saga step rolled back");
            }
            Ok(())
        } else if Some(topic) == Topic::compensation_for(source) {
            let outcome = self
                .executor
                .run_compensation(event)
                .await
                .map_err(|e| handler_error(message, e))?;
            match outcome.failure {
                Some(failure) => Err(handler_error(message, failure)),
                None => Ok(()),
            }
        } else {
            Err(BrokerError::NoHandler(message.topic.clone()))
        }
    }
}
