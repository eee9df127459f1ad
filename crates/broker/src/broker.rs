use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{Message, Result};

/// A stream of messages from one or more subscribed topics.
pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Publish/subscribe contract the saga services rely on.
///
/// Delivery is at-least-once: consumers must tolerate redelivery. Messages
/// published to the same topic are delivered to a subscriber in publish order.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a serialized payload to a topic.
    async fn send(&self, topic: &str, payload: String) -> Result<()>;

    /// Subscribes to the given topics.
    ///
    /// Only messages published after the subscription is created are delivered.
    async fn subscribe(&self, topics: &[String]) -> Result<MessageStream>;
}

#[async_trait]
impl<B: MessageBroker + ?Sized> MessageBroker for Arc<B> {
    async fn send(&self, topic: &str, payload: String) -> Result<()> {
        (**self).send(topic, payload).await
    }

    async fn subscribe(&self, topics: &[String]) -> Result<MessageStream> {
        (**self).subscribe(topics).await
    }
}
