//! Order service: the HTTP entry point of the order saga.
//!
//! Accepts orders, hands them to the orchestrator through the `start-saga`
//! topic, and records every finished saga delivered on `notify-ending` so it
//! can be queried later. Structured logging goes through `tracing` and
//! counters are exported for Prometheus.

pub mod config;
pub mod error;
pub mod history;
pub mod notify;
pub mod postgres;
pub mod repository;
pub mod routes;
pub mod runtime;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use broker::MessageBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use history::HistoryService;
use repository::EventRepository;

pub use config::{Config, LogFormat};
pub use error::{ApiError, StoreError};
pub use notify::NotifyEndingHandler;
pub use postgres::PostgresEventRepository;
pub use repository::InMemoryEventRepository;

/// Shared application state accessible from all handlers.
pub struct AppState<R: EventRepository> {
    pub broker: Arc<dyn MessageBroker>,
    pub history: Arc<HistoryService<R>>,
}

impl<R: EventRepository> AppState<R> {
    pub fn new(broker: Arc<dyn MessageBroker>, repository: R) -> Self {
        Self {
            broker,
            history: Arc::new(HistoryService::new(repository)),
        }
    }

    /// Handler recording finished sagas into this state's history.
    pub fn notify_handler(&self) -> NotifyEndingHandler<R> {
        NotifyEndingHandler::new(self.history.clone())
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: EventRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/order", post(routes::orders::create::<R>))
        .route("/api/event", get(routes::events::find_by_filters::<R>))
        .route("/api/event/all", get(routes::events::find_all::<R>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
