//! HTTP API server with observability for the order system.
//!
//! Provides REST endpoints for order creation and lookup, with structured
//! logging (tracing) and Prometheus metrics. Order creation runs the full
//! saga; the outbox drain and the reconciliation sweep run as background
//! tasks owned by the binary.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use ledger::{InMemoryLedger, InventoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    InMemoryEventBus, InMemoryUserDirectory, OrderOrchestrator, OutboxDrain, ReconciliationSweep,
};
use store::{InMemoryOrderStore, InMemoryOutbox, OrderStore, Outbox};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, S, O>(state: Arc<AppState<L, S, O>>, metrics_handle: PrometheusHandle) -> Router
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    O: Outbox + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<L, S, O>))
        .route("/orders", get(routes::orders::list::<L, S, O>))
        .route("/orders/{id}", get(routes::orders::get::<L, S, O>))
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

/// In-memory application state plus the background workers the binary
/// must spawn alongside the server.
pub struct DefaultState {
    pub state: Arc<AppState<InMemoryLedger, InMemoryOrderStore, InMemoryOutbox>>,
    pub drain: OutboxDrain<InMemoryOutbox, InMemoryEventBus>,
    pub sweep: ReconciliationSweep<InMemoryOrderStore, InMemoryOutbox, InMemoryLedger>,
    pub bus: Arc<InMemoryEventBus>,
}

/// Creates the default application state backed by in-memory services.
pub fn create_default_state(
    outbox_poll_interval: Duration,
    sweep_interval: Duration,
) -> DefaultState {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let store = Arc::new(InMemoryOrderStore::new());
    let outbox = Arc::new(InMemoryOutbox::new());
    let bus = Arc::new(InMemoryEventBus::new());

    let orchestrator = OrderOrchestrator::new(
        directory.clone(),
        ledger.clone(),
        store.clone(),
        outbox.clone(),
    );
    let backlog = orchestrator.release_backlog();

    let drain = OutboxDrain::new(outbox.clone(), bus.clone(), outbox_poll_interval);
    let sweep = ReconciliationSweep::new(
        store.clone(),
        outbox.clone(),
        ledger.clone(),
        backlog,
        sweep_interval,
    );

    let state = Arc::new(AppState {
        orchestrator,
        directory,
        ledger,
        store,
    });

    DefaultState {
        state,
        drain,
        sweep,
        bus,
    }
}
