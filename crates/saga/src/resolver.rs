//! Resolves the next topic for an event from the routing table.

use crate::error::{Result, SagaError};
use crate::event::Event;
use crate::routing::SagaRoutingTable;
use crate::status::{EventSource, SagaStatus};
use crate::topic::Topic;

/// Class of a saga transition, used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The orchestrator dispatches the first step.
    Start,
    /// A participant succeeded; move forward.
    Continue,
    /// A participant failed; it must undo its own partial effects.
    RollbackCurrent,
    /// A participant compensated; unwind to the previous participant.
    RollbackPrevious,
}

impl Transition {
    /// Classifies a (source, status) pair.
    pub fn classify(source: EventSource, status: SagaStatus) -> Self {
        match (source, status) {
            (EventSource::Orchestrator, SagaStatus::Success) => Transition::Start,
            (_, SagaStatus::Success) => Transition::Continue,
            (_, SagaStatus::RollbackPending) => Transition::RollbackCurrent,
            (_, SagaStatus::Fail) => Transition::RollbackPrevious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Continue => "continue",
            Transition::RollbackCurrent => "rollback_current",
            Transition::RollbackPrevious => "rollback_previous",
        }
    }
}

/// Looks up the next topic for an event.
///
/// Resolution is a pure function of the event's (source, status) and the
/// table; the only side effect is logging.
#[derive(Debug, Clone, Default)]
pub struct TopicResolver {
    table: SagaRoutingTable,
}

impl TopicResolver {
    /// Creates a resolver over the given table.
    pub fn new(table: SagaRoutingTable) -> Self {
        Self { table }
    }

    /// Returns the underlying routing table.
    pub fn table(&self) -> &SagaRoutingTable {
        &self.table
    }

    /// Returns the next topic for `event`.
    ///
    /// Fails with a validation error when source or status is missing, or
    /// when no rule matches; both indicate a corrupted event or a table
    /// defect and must not be retried.
    pub fn resolve(&self, event: &Event) -> Result<Topic> {
        let (Some(source), Some(status)) = (event.source, event.status) else {
            return Err(SagaError::validation("Source and status must be informed!"));
        };

        let topic = self
            .table
            .lookup(source, status)
            .ok_or_else(|| SagaError::validation("Topic not found"))?;

        let transition = Transition::classify(source, status);
        log_transition(event, source, transition, topic);
        metrics::counter!("saga_transitions_total", "transition" => transition.as_str())
            .increment(1);

        Ok(topic)
    }
}

fn log_transition(event: &Event, source: EventSource, transition: Transition, topic: Topic) {
    let saga_id = event.log_id();
    match transition {
        Transition::Start | Transition::Continue => {
            tracing::info!(%source, next_topic = %topic, %saga_id, "current saga: success");
        }
        Transition::RollbackCurrent => {
            tracing::info!(
                %source,
                next_topic = %topic,
                %saga_id,
                "current saga: sending to rollback current service"
            );
        }
        Transition::RollbackPrevious => {
            tracing::info!(
                %source,
                next_topic = %topic,
                %saga_id,
                "current saga: sending to rollback previous service"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Order, OrderProducts, Product};
    use common::TransactionId;

    fn event_with(source: Option<EventSource>, status: Option<SagaStatus>) -> Event {
        let order = Order::new(vec![OrderProducts::new(Product::new("ABC", 10.0), 1)]);
        let mut event = Event::start(order, TransactionId::generate());
        event.source = source;
        event.status = status;
        event
    }

    #[test]
    fn test_missing_source_or_status_is_rejected() {
        let resolver = TopicResolver::default();
        for event in [
            event_with(None, Some(SagaStatus::Success)),
            event_with(Some(EventSource::Payment), None),
            event_with(None, None),
        ] {
            let err = resolver.resolve(&event).unwrap_err();
            assert!(err.is_validation());
            assert_eq!(err.to_string(), "Source and status must be informed!");
        }
    }

    #[test]
    fn test_unmapped_pair_is_topic_not_found() {
        let resolver = TopicResolver::default();
        let event = event_with(
            Some(EventSource::Orchestrator),
            Some(SagaStatus::RollbackPending),
        );
        let err = resolver.resolve(&event).unwrap_err();
        assert_eq!(err.to_string(), "Topic not found");
    }

    #[test]
    fn test_resolve_is_pure() {
        let resolver = TopicResolver::default();
        for source in EventSource::ALL {
            for status in SagaStatus::ALL {
                let event = event_with(Some(source), Some(status));
                let first = resolver.resolve(&event).ok();
                let second = resolver.resolve(&event).ok();
                assert_eq!(first, second);
                assert_eq!(first, resolver.table().lookup(source, status));
            }
        }
    }

    #[test]
    fn test_resolve_does_not_touch_event() {
        let resolver = TopicResolver::default();
        let event = event_with(Some(EventSource::Payment), Some(SagaStatus::Success));
        let before = event.clone();
        assert_eq!(resolver.resolve(&event).unwrap(), Topic::InventorySuccess);
        assert_eq!(event, before);
    }

    #[test]
    fn test_custom_table_is_used() {
        let table = SagaRoutingTable::from_routes([crate::routing::Route::new(
            EventSource::Payment,
            SagaStatus::Success,
            Topic::FinishSuccess,
        )])
        .unwrap();
        let resolver = TopicResolver::new(table);

        let event = event_with(Some(EventSource::Payment), Some(SagaStatus::Success));
        assert_eq!(resolver.resolve(&event).unwrap(), Topic::FinishSuccess);

        let event = event_with(Some(EventSource::Inventory), Some(SagaStatus::Success));
        assert!(resolver.resolve(&event).is_err());
    }

    #[test]
    fn test_transition_classification() {
        use EventSource::*;
        use SagaStatus::*;
        assert_eq!(Transition::classify(Orchestrator, Success), Transition::Start);
        assert_eq!(Transition::classify(Payment, Success), Transition::Continue);
        assert_eq!(
            Transition::classify(Inventory, RollbackPending),
            Transition::RollbackCurrent
        );
        assert_eq!(Transition::classify(Payment, Fail), Transition::RollbackPrevious);
        assert_eq!(
            Transition::classify(Orchestrator, Fail),
            Transition::RollbackPrevious
        );
    }
}
