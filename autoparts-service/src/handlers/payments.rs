//! Payment handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{MessageResponse, RecordPaymentRequest};
use crate::models::{CreatePayment, Payment, PaymentMethod, PaymentMethodSummaryRow};
use crate::startup::AppState;
use service_core::error::AppError;

/// POST /payments
#[tracing::instrument(skip(state, req), fields(payer = %req.payer_name))]
pub async fn record_payment(
    State(state): State<AppState>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    if req.payer_name.trim().is_empty() || req.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing required fields"
        )));
    }
    req.validate()?;

    let payment_method = match req.payment_method.as_deref() {
        None => PaymentMethod::Cash,
        Some(s) => PaymentMethod::parse(s).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Payment method must be one of: cash, card, check, bank_transfer"
            ))
        })?,
    };

    let payment = state
        .db
        .record_payment(&CreatePayment {
            invoice_id: req.invoice_id,
            invoice_number: req.invoice_number,
            payer_name: req.payer_name,
            amount: req.amount,
            payment_method,
            reference: req.reference,
            notes: req.notes,
            recorded_by: req.recorded_by,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /payments
#[tracing::instrument(skip(state))]
pub async fn list_payments(State(state): State<AppState>) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.db.list_payments().await?;
    Ok(Json(payments))
}

/// GET /payments/invoice/:invoice_id
#[tracing::instrument(skip(state))]
pub async fn payments_for_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.db.payments_for_invoice(invoice_id).await?;
    Ok(Json(payments))
}

/// GET /payments/statistics/summary
#[tracing::instrument(skip(state))]
pub async fn payment_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<PaymentMethodSummaryRow>>, AppError> {
    let rows = state.db.payment_method_summary().await?;
    Ok(Json(rows))
}

/// DELETE /payments/:id
#[tracing::instrument(skip(state))]
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = state.db.delete_payment(payment_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
    }
    Ok(Json(MessageResponse::new("Payment deleted successfully")))
}
