//! Invoice handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateInvoiceRequest, MessageResponse, UpdateInvoiceStatusRequest};
use crate::models::{CreateInvoice, CreateInvoiceLine, Invoice, InvoiceStatus, InvoiceWithItems};
use crate::startup::AppState;
use service_core::error::AppError;

/// GET /invoices
#[tracing::instrument(skip(state))]
pub async fn list_invoices(State(state): State<AppState>) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state.db.list_invoices().await?;
    Ok(Json(invoices))
}

/// GET /invoices/:id
#[tracing::instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceWithItems>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    Ok(Json(invoice))
}

/// POST /invoices
#[tracing::instrument(skip(state, req), fields(customer = %req.customer_name, lines = req.items.len()))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceWithItems>), AppError> {
    if req.customer_name.trim().is_empty() || req.items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing required fields"
        )));
    }
    req.validate()?;

    let tax_rate = req.tax_rate.unwrap_or(Decimal::ZERO);
    if tax_rate < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate cannot be negative"
        )));
    }

    let mut lines = Vec::with_capacity(req.items.len());
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line quantity must be positive"
            )));
        }
        if matches!(item.unit_price, Some(price) if price < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unit price cannot be negative"
            )));
        }
        lines.push(CreateInvoiceLine {
            part_id: item.part_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        });
    }

    let invoice = state
        .db
        .create_invoice(&CreateInvoice {
            customer_name: req.customer_name,
            customer_email: req.customer_email,
            customer_phone: req.customer_phone,
            lines,
            tax_rate,
            payment_method: req.payment_method,
            notes: req.notes,
            created_by: req.created_by,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

/// PATCH /invoices/:id/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceStatusRequest>,
) -> Result<Json<Invoice>, AppError> {
    let status = InvoiceStatus::parse(&req.status).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Status must be one of: pending, partial, paid"
        ))
    })?;

    let invoice = state
        .db
        .update_invoice_status(invoice_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice))
}

/// DELETE /invoices/:id
#[tracing::instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_invoice(invoice_id).await?;
    Ok(Json(MessageResponse::new("Invoice deleted successfully")))
}
