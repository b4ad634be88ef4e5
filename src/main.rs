use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod models;
mod services;
mod utils;

use crate::config::AppConfig;
use crate::services::matching::{EventBus, Exchange};

pub struct AppState {
    pub config: AppConfig,
    pub exchange: Arc<Exchange>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outcome_exchange=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting Outcome Exchange v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Event bus: bounded outbound queue drained by the fan-out worker
    let event_bus = Arc::new(EventBus::new(config.event_queue_capacity));
    event_bus.spawn_fanout_worker();
    tracing::info!(
        "Event bus initialized (queue capacity: {})",
        config.event_queue_capacity
    );

    // The exchange: ledgers, books and matching engine behind one lock
    let exchange = Arc::new(Exchange::new(event_bus.clone()));
    if config.seed_on_startup {
        exchange.reset();
        tracing::info!("Seed fixture loaded");
    }

    // Event log worker: consumes the broadcast side of the bus the way any
    // external fan-out (pub/sub, websocket bridge) would
    let mut event_receiver = exchange.event_bus().subscribe();
    tokio::spawn(async move {
        tracing::info!("Event log worker started");
        loop {
            match event_receiver.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => tracing::debug!("Event: {}", payload),
                    Err(e) => tracing::warn!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event log worker lagged {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Event channel closed, event log worker stopped");
                    break;
                }
            }
        }
    });

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        exchange,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::routes::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
