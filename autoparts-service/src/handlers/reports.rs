//! Reporting handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{
    InventorySummaryRow, PaymentMethodSummaryRow, SalesSummaryRow, StockMovement,
};
use crate::startup::AppState;
use service_core::error::AppError;

/// Query params for the sales report.
#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Query params for the audit log listing.
#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /reports/sales/summary
#[tracing::instrument(skip(state))]
pub async fn sales_summary(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> Result<Json<Vec<SalesSummaryRow>>, AppError> {
    let rows = state
        .db
        .sales_summary(query.start_date, query.end_date)
        .await?;
    Ok(Json(rows))
}

/// GET /reports/inventory/summary
#[tracing::instrument(skip(state))]
pub async fn inventory_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<InventorySummaryRow>>, AppError> {
    let rows = state.db.inventory_summary().await?;
    Ok(Json(rows))
}

/// GET /reports/payments/summary
#[tracing::instrument(skip(state))]
pub async fn payments_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<PaymentMethodSummaryRow>>, AppError> {
    let rows = state.db.payment_method_summary().await?;
    Ok(Json(rows))
}

/// GET /reports/audit/logs
#[tracing::instrument(skip(state))]
pub async fn audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Vec<StockMovement>>, AppError> {
    let rows = state.db.list_movements(query.limit, query.offset).await?;
    Ok(Json(rows))
}
