//! Runs the order service together with the orchestrator and every
//! participant, wired over the in-memory broker.

use std::sync::Arc;

use broker::{Dispatcher, InMemoryBroker};
use order_service::repository::EventRepository;
use order_service::runtime::{self, DEMO_STOCK, Participants};
use order_service::{
    AppState, Config, InMemoryEventRepository, LogFormat, PostgresEventRepository,
};
use saga::PaymentSettings;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<R: EventRepository + 'static>(config: Config, repository: R) {
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let broker = InMemoryBroker::new();
    let state = Arc::new(AppState::new(Arc::new(broker.clone()), repository));

    let participants = Participants::seeded(
        &DEMO_STOCK,
        PaymentSettings {
            min_amount: config.payment_min_amount,
        },
    );
    let mut dispatchers = participants.dispatchers(&broker);
    dispatchers.push(runtime::orchestrator_dispatcher(&broker));
    dispatchers.push(Dispatcher::new().with(Arc::new(state.notify_handler())));

    let (stop_tx, stop_rx) = watch::channel(false);
    let consumers = runtime::spawn_consumers(&broker, dispatchers, &stop_rx)
        .await
        .expect("failed to subscribe saga consumers");
    tracing::info!(consumers = consumers.len(), "saga consumers started");

    let app = order_service::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting order service");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = stop_tx.send(true);
    for consumer in consumers {
        match consumer.await {
            Ok(processed) => tracing::debug!(processed, "consumer stopped"),
            Err(e) => tracing::error!(error = %e, "consumer task panicked"),
        }
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(&config);

    match config.database_url.clone() {
        Some(url) => {
            let repository = PostgresEventRepository::connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            repository
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("saga history stored in PostgreSQL");
            serve(config, repository).await;
        }
        None => {
            tracing::info!("saga history kept in memory");
            serve(config, InMemoryEventRepository::new()).await;
        }
    }
}
