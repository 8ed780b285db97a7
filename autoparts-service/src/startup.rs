//! Application startup and lifecycle management.

use crate::config::ServiceConfig;
use crate::handlers::{customers, inventory, invoices, payments, reports};
use crate::services::{get_metrics, init_metrics, Database};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub db: Arc<Database>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "autoparts-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "autoparts-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Build the full application router.
fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        // Inventory
        .route(
            "/inventory",
            get(inventory::list_parts).post(inventory::create_part),
        )
        .route("/inventory/search/:query", get(inventory::search_parts))
        .route("/inventory/low-stock/items", get(inventory::low_stock))
        .route(
            "/inventory/:id",
            get(inventory::get_part)
                .put(inventory::update_part)
                .delete(inventory::delete_part),
        )
        .route("/inventory/:id/adjust", post(inventory::adjust_quantity))
        // Invoices
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(invoices::get_invoice).delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/status", patch(invoices::update_status))
        // Payments
        .route(
            "/payments",
            get(payments::list_payments).post(payments::record_payment),
        )
        .route(
            "/payments/invoice/:invoice_id",
            get(payments::payments_for_invoice),
        )
        .route(
            "/payments/statistics/summary",
            get(payments::payment_summary),
        )
        .route("/payments/:id", delete(payments::delete_payment))
        // Customers
        .route("/customers", get(customers::list_customers))
        .route("/customers/:name/history", get(customers::customer_history))
        .route(
            "/customers/:name/statistics",
            get(customers::customer_statistics),
        )
        // Reports
        .route("/reports/sales/summary", get(reports::sales_summary))
        .route("/reports/inventory/summary", get(reports::inventory_summary))
        .route("/reports/payments/summary", get(reports::payments_summary))
        .route("/reports/audit/logs", get(reports::audit_logs))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ServiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the harness.
    pub async fn build_without_migrations(config: ServiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: ServiceConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        if run_migrations {
            db.run_migrations().await?;
        }

        let state = AppState {
            config: config.clone(),
            db: Arc::new(db),
        };

        // Port 0 binds a random free port, which the tests rely on.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Auto-parts service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown signal handler: {}", e);
    }
}
