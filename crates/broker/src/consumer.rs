use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::{BrokerError, Message, MessageBroker, MessageStream, Result};

/// Processes messages for a fixed set of topics.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns the name of this handler, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the topics this handler consumes.
    fn topics(&self) -> Vec<String>;

    /// Handles a single message.
    async fn handle(&self, message: &Message) -> Result<()>;
}

/// Routes messages to the handler registered for their topic.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every topic it consumes.
    ///
    /// A later registration for the same topic replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) {
        for topic in handler.topics() {
            self.insert(topic, handler.clone());
        }
    }

    /// Takes over every registration of `other`.
    pub fn merge(&mut self, other: Dispatcher) {
        for (topic, handler) in other.handlers {
            self.insert(topic, handler);
        }
    }

    fn insert(&mut self, topic: String, handler: Arc<dyn MessageHandler>) {
        if let Some(previous) = self.handlers.insert(topic.clone(), handler.clone()) {
            tracing::warn!(
                %topic,
                previous = previous.name(),
                current = handler.name(),
                "topic handler replaced"
            );
        }
    }

    /// Builder-style variant of [`Dispatcher::register`].
    pub fn with(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Returns the topics covered by registered handlers, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns true if a handler is registered for the topic.
    pub fn handles(&self, topic: &str) -> bool {
        self.handlers.contains_key(topic)
    }

    /// Delivers a message to the handler for its topic.
    pub async fn dispatch(&self, message: &Message) -> Result<()> {
        let handler = self
            .handlers
            .get(&message.topic)
            .ok_or_else(|| BrokerError::NoHandler(message.topic.clone()))?;
        handler.handle(message).await
    }
}

/// Subscribes a dispatcher to its topics and processes messages until shutdown.
///
/// A message whose handler fails is logged and counted, then skipped; any
/// redelivery or dead-lettering is the broker's concern.
pub struct Consumer<B: MessageBroker> {
    broker: B,
    dispatcher: Dispatcher,
}

impl<B: MessageBroker> Consumer<B> {
    /// Creates a consumer for the given broker and dispatcher.
    pub fn new(broker: B, dispatcher: Dispatcher) -> Self {
        Self { broker, dispatcher }
    }

    /// Subscribes to the dispatcher's topics.
    ///
    /// Messages published once this returns are held for
    /// [`Subscription::run`], so callers can subscribe first and start
    /// producing before the consume loop is scheduled.
    pub async fn subscribe(self) -> Result<Subscription> {
        let stream = self.broker.subscribe(&self.dispatcher.topics()).await?;
        Ok(Subscription {
            stream,
            dispatcher: self.dispatcher,
        })
    }

    /// Subscribes, then runs the consume loop until `shutdown` resolves or
    /// the stream ends.
    ///
    /// Returns the number of messages processed (successfully or not).
    pub async fn run<F>(self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()> + Send,
    {
        Ok(self.subscribe().await?.run(shutdown).await)
    }
}

/// A live subscription waiting to be consumed.
pub struct Subscription {
    stream: MessageStream,
    dispatcher: Dispatcher,
}

impl Subscription {
    /// Runs the consume loop until `shutdown` resolves or the stream ends.
    ///
    /// Returns the number of messages processed (successfully or not).
    #[tracing::instrument(skip_all, fields(topics = ?self.dispatcher.topics()))]
    pub async fn run<F>(self, shutdown: F) -> u64
    where
        F: Future<Output = ()> + Send,
    {
        let Subscription {
            mut stream,
            dispatcher,
        } = self;
        tokio::pin!(shutdown);

        let mut processed: u64 = 0;
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!(processed, "consumer shutting down");
                    break;
                }
                next = stream.next() => {
                    let Some(message) = next else {
                        tracing::info!(processed, "subscription closed");
                        break;
                    };
                    process(&dispatcher, &message).await;
                    processed += 1;
                }
            }
        }

        processed
    }
}

async fn process(dispatcher: &Dispatcher, message: &Message) {
    if let Err(e) = dispatcher.dispatch(message).await {
        metrics::counter!("broker_messages_failed_total", "topic" => message.topic.clone())
            .increment(1);
        tracing::error!(
            topic = %message.topic,
            offset = message.offset,
            error = %e,
            "message processing failed"
        );
    }
}
