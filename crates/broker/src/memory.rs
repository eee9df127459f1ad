use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use crate::{Message, MessageBroker, MessageStream, Result};

#[derive(Default)]
struct BrokerState {
    next_offset: u64,
    /// Only kept when the broker was built with [`InMemoryBroker::with_log`].
    log: Option<Vec<Message>>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Message>>>,
}

impl BrokerState {
    fn log(&self) -> &[Message] {
        self.log.as_deref().unwrap_or_default()
    }
}

/// In-memory broker for tests and single-process deployments.
///
/// Published messages are fanned out to the live subscribers of their topic
/// and then dropped. A broker built with [`InMemoryBroker::with_log`] also
/// keeps every message in a log that the inspection methods read; without
/// it they see nothing.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates a broker that only delivers to subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that also records every published message.
    pub fn with_log() -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState {
                log: Some(Vec::new()),
                ..BrokerState::default()
            })),
        }
    }

    /// Returns true if published messages are recorded.
    pub async fn is_logging(&self) -> bool {
        self.state.read().await.log.is_some()
    }

    /// Returns the number of recorded messages.
    pub async fn message_count(&self) -> usize {
        self.state.read().await.log().len()
    }

    /// Returns all messages published to a topic, in publish order.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        self.state
            .read()
            .await
            .log()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Returns every message with an offset greater than or equal to `offset`.
    pub async fn messages_since(&self, offset: u64) -> Vec<Message> {
        self.state
            .read()
            .await
            .log()
            .iter()
            .filter(|m| m.offset >= offset)
            .cloned()
            .collect()
    }

    /// Returns the number of live subscriptions for a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .subscribers
            .get(topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Returns the topics of all published messages, in publish order.
    pub async fn topic_trail(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .log()
            .iter()
            .map(|m| m.topic.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn send(&self, topic: &str, payload: String) -> Result<()> {
        let mut state = self.state.write().await;

        let message = Message::new(state.next_offset, topic, payload);
        state.next_offset += 1;
        if let Some(log) = state.log.as_mut() {
            log.push(message.clone());
        }

        if let Some(senders) = state.subscribers.get_mut(topic) {
            senders.retain(|tx| tx.send(message.clone()).is_ok());
        }

        metrics::counter!("broker_messages_published_total", "topic" => topic.to_string())
            .increment(1);
        tracing::debug!(topic, offset = message.offset, "message published");

        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> Result<MessageStream> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.write().await;
        for topic in topics {
            state
                .subscribers
                .entry(topic.clone())
                .or_default()
                .push(tx.clone());
        }

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        });

        Ok(Box::pin(stream))
    }
}
