//! API server entry point.

use common::{Money, UserId};
use tokio::signal;
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

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build application state and background workers
    let config = api::config::Config::from_env();
    let defaults =
        api::create_default_state(config.outbox_poll_interval, config.sweep_interval);

    // Demo data so the server is usable out of the box.
    let demo_user = UserId::new();
    defaults.state.directory.add_user(demo_user);
    defaults
        .state
        .ledger
        .set_stock("SKU-WIDGET", 100, Money::from_cents(1999));
    defaults
        .state
        .ledger
        .set_stock("SKU-GADGET", 25, Money::from_cents(4999));
    tracing::info!(%demo_user, "seeded demo user and inventory");

    // 4. Spawn the outbox drain and the reconciliation sweep
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let drain = defaults.drain;
    let sweep = defaults.sweep;
    let drain_rx = shutdown_rx.clone();
    let drain_task = tokio::spawn(async move { drain.run(drain_rx).await });
    let sweep_task = tokio::spawn(async move { sweep.run(shutdown_rx).await });

    // 5. Build the application
    let app = api::create_app(defaults.state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop background workers
    let _ = shutdown_tx.send(true);
    let _ = drain_task.await;
    let _ = sweep_task.await;

    tracing::info!("server shut down gracefully");
}
