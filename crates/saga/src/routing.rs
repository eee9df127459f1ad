//! The saga routing table: (source, status) → next topic.

use std::collections::HashMap;

use crate::error::RoutingTableError;
use crate::status::{EventSource, SagaStatus};
use crate::topic::Topic;

/// Composite key of a routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    pub source: EventSource,
    pub status: SagaStatus,
}

impl RoutingKey {
    pub fn new(source: EventSource, status: SagaStatus) -> Self {
        Self { source, status }
    }
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.source, self.status)
    }
}

/// A single routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub key: RoutingKey,
    pub topic: Topic,
}

impl Route {
    pub fn new(source: EventSource, status: SagaStatus, topic: Topic) -> Self {
        Self {
            key: RoutingKey::new(source, status),
            topic,
        }
    }
}

/// Next topic for the order saga.
///
/// No wildcard arm: a new source or status does not compile until its
/// route has been decided here.
fn order_saga_route(source: EventSource, status: SagaStatus) -> Option<Topic> {
    use EventSource::*;
    use SagaStatus::*;

    match (source, status) {
        (Orchestrator, Success) => Some(Topic::ProductValidationSuccess),
        (Orchestrator, Fail) => Some(Topic::FinishFail),
        (Orchestrator, RollbackPending) => None,

        (ProductValidation, Success) => Some(Topic::PaymentSuccess),
        (ProductValidation, RollbackPending) => Some(Topic::ProductValidationFail),
        (ProductValidation, Fail) => Some(Topic::FinishFail),

        (Payment, Success) => Some(Topic::InventorySuccess),
        (Payment, RollbackPending) => Some(Topic::PaymentFail),
        (Payment, Fail) => Some(Topic::ProductValidationFail),

        (Inventory, Success) => Some(Topic::FinishSuccess),
        (Inventory, RollbackPending) => Some(Topic::InventoryFail),
        (Inventory, Fail) => Some(Topic::PaymentFail),
    }
}

/// Static mapping of (source, status) to the next topic.
///
/// Keys are unique by construction; a lookup hashes the key once.
#[derive(Debug, Clone)]
pub struct SagaRoutingTable {
    routes: HashMap<RoutingKey, Topic>,
}

impl SagaRoutingTable {
    /// The routing table of the order saga.
    pub fn order_saga() -> Self {
        let routes = EventSource::ALL
            .into_iter()
            .flat_map(|source| SagaStatus::ALL.into_iter().map(move |status| (source, status)))
            .filter_map(|(source, status)| {
                order_saga_route(source, status).map(|topic| (RoutingKey::new(source, status), topic))
            })
            .collect();
        Self { routes }
    }

    /// Builds a table from explicit rules, rejecting duplicate keys.
    pub fn from_routes(
        routes: impl IntoIterator<Item = Route>,
    ) -> Result<Self, RoutingTableError> {
        let mut table = HashMap::new();
        for route in routes {
            if table.insert(route.key, route.topic).is_some() {
                return Err(RoutingTableError::DuplicateRoute(route.key));
            }
        }
        Ok(Self { routes: table })
    }

    /// Looks up the next topic for a (source, status) pair.
    pub fn lookup(&self, source: EventSource, status: SagaStatus) -> Option<Topic> {
        self.routes.get(&RoutingKey::new(source, status)).copied()
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns every rule, in a stable order (by source, then status).
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .map(|(key, topic)| Route {
                key: *key,
                topic: *topic,
            })
            .collect();
        routes.sort_by_key(|r| {
            (
                EventSource::ALL.iter().position(|s| *s == r.key.source),
                SagaStatus::ALL.iter().position(|s| *s == r.key.status),
            )
        });
        routes
    }
}

impl Default for SagaRoutingTable {
    fn default() -> Self {
        Self::order_saga()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EventSource::*;
    use SagaStatus::*;

    #[test]
    fn test_order_saga_table_has_eleven_rules() {
        let table = SagaRoutingTable::order_saga();
        assert_eq!(table.len(), 11);
        assert_eq!(table.lookup(Orchestrator, RollbackPending), None);
    }

    #[test]
    fn test_forward_path() {
        let table = SagaRoutingTable::order_saga();
        assert_eq!(
            table.lookup(Orchestrator, Success),
            Some(Topic::ProductValidationSuccess)
        );
        assert_eq!(
            table.lookup(ProductValidation, Success),
            Some(Topic::PaymentSuccess)
        );
        assert_eq!(table.lookup(Payment, Success), Some(Topic::InventorySuccess));
        assert_eq!(table.lookup(Inventory, Success), Some(Topic::FinishSuccess));
    }

    #[test]
    fn test_rollback_pending_routes_to_own_compensation() {
        let table = SagaRoutingTable::order_saga();
        for source in [ProductValidation, Payment, Inventory] {
            assert_eq!(
                table.lookup(source, RollbackPending),
                Topic::compensation_for(source),
                "{source}"
            );
        }
    }

    #[test]
    fn test_fail_routes_to_predecessor_compensation() {
        let table = SagaRoutingTable::order_saga();
        assert_eq!(table.lookup(Inventory, Fail), Some(Topic::PaymentFail));
        assert_eq!(table.lookup(Payment, Fail), Some(Topic::ProductValidationFail));
        assert_eq!(table.lookup(ProductValidation, Fail), Some(Topic::FinishFail));
        assert_eq!(table.lookup(Orchestrator, Fail), Some(Topic::FinishFail));
    }

    #[test]
    fn test_from_routes_rejects_duplicates() {
        let result = SagaRoutingTable::from_routes([
            Route::new(Payment, Success, Topic::InventorySuccess),
            Route::new(Payment, Success, Topic::FinishSuccess),
        ]);
        assert_eq!(
            result.unwrap_err(),
            RoutingTableError::DuplicateRoute(RoutingKey::new(Payment, Success))
        );
    }

    #[test]
    fn test_from_routes_round_trips_standard_table() {
        let standard = SagaRoutingTable::order_saga();
        let rebuilt = SagaRoutingTable::from_routes(standard.routes()).unwrap();
        assert_eq!(rebuilt.routes(), standard.routes());
    }

    #[test]
    fn test_routes_are_ordered() {
        let routes = SagaRoutingTable::order_saga().routes();
        assert_eq!(routes[0].key, RoutingKey::new(Orchestrator, Success));
        assert_eq!(routes[10].key, RoutingKey::new(Inventory, Fail));
    }
}
