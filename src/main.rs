use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

mod backpressure;
mod config;
mod error;
mod handlers;
mod models;
mod simulator;
mod store;

use crate::backpressure::AdmissionGate;
use crate::config::Config;
use crate::models::{Device, PaymentOrder};
use crate::simulator::{CompletionPolicy, RandomCompletion, Simulator, TaskSupervisor};
use crate::store::ResourceStore;

/// Shared application state — cheap to clone (all heap behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub devices: ResourceStore<Device>,
    pub orders: ResourceStore<PaymentOrder>,
    pub device_processing: Simulator<Device>,
    pub order_processing: Simulator<PaymentOrder>,
    pub payments: AdmissionGate,
    pub tasks: TaskSupervisor,
}

impl AppState {
    pub fn new(max_concurrent_payments: usize) -> Self {
        Self::with_policies(
            Arc::new(RandomCompletion::devices()),
            Arc::new(RandomCompletion::orders()),
            max_concurrent_payments,
        )
    }

    pub fn with_policies(
        device_policy: Arc<dyn CompletionPolicy>,
        order_policy: Arc<dyn CompletionPolicy>,
        max_concurrent_payments: usize,
    ) -> Self {
        let tasks = TaskSupervisor::new();
        let devices = ResourceStore::new();
        let orders = ResourceStore::new();

        Self {
            device_processing: Simulator::new(devices.clone(), device_policy, tasks.clone()),
            order_processing: Simulator::new(orders.clone(), order_policy, tasks.clone()),
            devices,
            orders,
            payments: AdmissionGate::new(max_concurrent_payments),
            tasks,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,async_pattern_service=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    info!(
        max_concurrent_payments = config.max_concurrent_payments,
        shutdown_grace_secs = config.shutdown_grace.as_secs(),
        "Async pattern service starting"
    );

    let state = AppState::new(config.max_concurrent_payments);
    let tasks = state.tasks.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);
    info!("Quick-start: POST http://{}/devices  →  then poll GET http://{}/devices/<id>/status", addr, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if tasks.shutdown(config.shutdown_grace).await {
        info!("Background tasks drained");
    } else {
        warn!(pending = tasks.pending(), "Shutdown grace period elapsed with tasks still running");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Devices ─────────────────────────────────────────────────────────
        .route(
            "/devices",
            get(handlers::devices::list_devices).post(handlers::devices::create_device),
        )
        .route(
            "/devices/_test/cleanup",
            delete(handlers::devices::cleanup_devices),
        )
        .route(
            "/devices/:id",
            get(handlers::devices::get_device)
                .put(handlers::devices::update_device)
                .patch(handlers::devices::patch_device)
                .delete(handlers::devices::delete_device),
        )
        .route("/devices/:id/status", get(handlers::devices::device_status))

        // ── Payment orders ──────────────────────────────────────────────────
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/_test/cleanup",
            delete(handlers::orders::cleanup_orders),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/status", get(handlers::orders::order_status))

        // ── Payments v1 (backpressure) ──────────────────────────────────────
        .route(
            "/api/v1/payments/_metrics",
            get(handlers::payments::payment_metrics),
        )
        .route(
            "/api/v1/payments/:order_id",
            post(handlers::payments::process_payment),
        )

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
