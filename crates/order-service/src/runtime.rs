//! In-process wiring of the orchestrator and the three participants.
//!
//! Every service gets its own [`Dispatcher`] and runs as its own
//! [`Consumer`], so the services only ever talk through the broker.

use std::sync::Arc;

use broker::{Consumer, Dispatcher, MessageBroker};
use saga::{
    InMemoryProductCatalog, InMemoryRecordRepository, InMemoryStockRepository, InventoryService,
    OrchestratorHandler, ParticipantHandler, PaymentService, PaymentSettings,
    ProductValidationService, SagaOrchestrator,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Catalog and stock loaded by the binary.
pub const DEMO_STOCK: [(&str, u32); 4] = [
    ("COMIC_BOOKS", 10),
    ("BOOKS", 10),
    ("MOVIES", 10),
    ("MUSIC", 10),
];

/// The participant services, backed by in-memory stores.
///
/// Clones share their stores, so the copies kept here observe what the
/// consumers do.
#[derive(Clone)]
pub struct Participants {
    pub validation: ProductValidationService,
    pub payment: PaymentService,
    pub inventory: InventoryService,
}

impl Participants {
    /// Creates participants whose catalog and stock hold `stock`.
    pub fn seeded(stock: &[(&str, u32)], settings: PaymentSettings) -> Self {
        let codes = stock.iter().map(|(code, _)| *code);
        Self {
            validation: ProductValidationService::new(
                InMemoryProductCatalog::with_codes(codes),
                InMemoryRecordRepository::new(),
            ),
            payment: PaymentService::with_settings(InMemoryRecordRepository::new(), settings),
            inventory: InventoryService::new(
                InMemoryStockRepository::with_stock(stock.iter().copied()),
                InMemoryRecordRepository::new(),
            ),
        }
    }

    /// One dispatcher per participant.
    pub fn dispatchers<B>(&self, broker: &B) -> Vec<Dispatcher>
    where
        B: MessageBroker + Clone + 'static,
    {
        vec![
            Dispatcher::new().with(Arc::new(ParticipantHandler::new(
                self.validation.clone(),
                broker.clone(),
            ))),
            Dispatcher::new().with(Arc::new(ParticipantHandler::new(
                self.payment.clone(),
                broker.clone(),
            ))),
            Dispatcher::new().with(Arc::new(ParticipantHandler::new(
                self.inventory.clone(),
                broker.clone(),
            ))),
        ]
    }
}

/// Dispatcher for the orchestrator.
pub fn orchestrator_dispatcher<B>(broker: &B) -> Dispatcher
where
    B: MessageBroker + Clone + 'static,
{
    Dispatcher::new().with(Arc::new(OrchestratorHandler::new(SagaOrchestrator::new(
        broker.clone(),
    ))))
}

/// Spawns one consumer per dispatcher; each stops once `shutdown` flips to true.
///
/// Every subscription is in place when this returns, so nothing published
/// afterwards can be missed.
pub async fn spawn_consumers<B>(
    broker: &B,
    dispatchers: Vec<Dispatcher>,
    shutdown: &watch::Receiver<bool>,
) -> broker::Result<Vec<JoinHandle<u64>>>
where
    B: MessageBroker + Clone + 'static,
{
    let mut subscriptions = Vec::with_capacity(dispatchers.len());
    for dispatcher in dispatchers {
        subscriptions.push(Consumer::new(broker.clone(), dispatcher).subscribe().await?);
    }

    Ok(subscriptions
        .into_iter()
        .map(|subscription| {
            let mut shutdown = shutdown.clone();
            tokio::spawn(subscription.run(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            }))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatchers_cover_every_consumed_topic() {
        let broker = broker::InMemoryBroker::new();
        let participants = Participants::seeded(&DEMO_STOCK, PaymentSettings::default());

        let mut topics: Vec<String> = participants
            .dispatchers(&broker)
            .iter()
            .chain([orchestrator_dispatcher(&broker)].iter())
            .flat_map(|d| d.topics())
            .collect();
        topics.sort();

        assert_eq!(
            topics,
            vec![
                "finish-fail",
                "finish-success",
                "inventory-fail",
                "inventory-success",
                "orchestrator",
                "payment-fail",
                "payment-success",
                "product-validation-fail",
                "product-validation-success",
                "start-saga",
            ]
        );
    }

    #[tokio::test]
    async fn test_consumers_are_subscribed_before_return() {
        let broker = broker::InMemoryBroker::with_log();
        let participants = Participants::seeded(&DEMO_STOCK, PaymentSettings::default());
        let mut dispatchers = participants.dispatchers(&broker);
        dispatchers.push(orchestrator_dispatcher(&broker));
        let (stop_tx, stop_rx) = watch::channel(false);

        let consumers = spawn_consumers(&broker, dispatchers, &stop_rx)
            .await
            .unwrap();

        // No yield between spawning and publishing.
        assert_eq!(broker.subscriber_count("start-saga").await, 1);
        let order = saga::Order::new(vec![saga::OrderProducts::new(
            saga::Product::new("BOOKS", 5.0),
            2,
        )]);
        broker
            .send("start-saga", serde_json::to_string(&order).unwrap())
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while broker.messages("notify-ending").await.is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("saga did not finish");
        assert_eq!(
            participants.inventory.stock().available("BOOKS").await,
            Some(8)
        );

        stop_tx.send(true).unwrap();
        for consumer in consumers {
            consumer.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_seeded_stock() {
        let participants = Participants::seeded(&DEMO_STOCK, PaymentSettings::default());
        assert_eq!(
            participants.inventory.stock().available("BOOKS").await,
            Some(10)
        );
    }
}
