//! Customer handlers. Customers are derived from the invoices they appear
//! on; there is no standalone customer table.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::models::{CustomerHistoryRow, CustomerStatistics, CustomerSummary};
use crate::startup::AppState;
use service_core::error::AppError;

/// GET /customers
#[tracing::instrument(skip(state))]
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<CustomerSummary>>, AppError> {
    let customers = state.db.list_customers().await?;
    Ok(Json(customers))
}

/// GET /customers/:name/history
#[tracing::instrument(skip(state))]
pub async fn customer_history(
    State(state): State<AppState>,
    Path(customer_name): Path<String>,
) -> Result<Json<Vec<CustomerHistoryRow>>, AppError> {
    let history = state.db.customer_history(&customer_name).await?;
    Ok(Json(history))
}

/// GET /customers/:name/statistics
#[tracing::instrument(skip(state))]
pub async fn customer_statistics(
    State(state): State<AppState>,
    Path(customer_name): Path<String>,
) -> Result<Json<CustomerStatistics>, AppError> {
    let stats = state
        .db
        .customer_statistics(&customer_name)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
    Ok(Json(stats))
}
