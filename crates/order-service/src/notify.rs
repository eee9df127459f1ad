//! Consumer of the `notify-ending` topic.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{BrokerError, Message, MessageHandler};
use saga::{Event, Topic};

use crate::history::HistoryService;
use crate::repository::EventRepository;

/// Records every finished saga in the history.
pub struct NotifyEndingHandler<R: EventRepository> {
    history: Arc<HistoryService<R>>,
}

impl<R: EventRepository> NotifyEndingHandler<R> {
    pub fn new(history: Arc<HistoryService<R>>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl<R: EventRepository + 'static> MessageHandler for NotifyEndingHandler<R> {
    fn name(&self) -> &'static str {
        "notify-ending"
    }

    fn topics(&self) -> Vec<String> {
        vec![Topic::NotifyEnding.as_str().to_string()]
    }

    async fn handle(&self, message: &Message) -> broker::Result<()> {
        let event: Event = message.decode()?;
        self.history
            .notify_ending(event)
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::handler(message.topic.clone(), format!("{e:?}")))
    }
}
