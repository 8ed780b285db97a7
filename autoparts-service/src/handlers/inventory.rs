//! Part (inventory) handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{AdjustQuantityRequest, CreatePartRequest, MessageResponse, UpdatePartRequest};
use crate::models::{CreatePart, MovementType, Part, UpdatePart};
use crate::startup::AppState;
use service_core::error::AppError;

/// GET /inventory
#[tracing::instrument(skip(state))]
pub async fn list_parts(State(state): State<AppState>) -> Result<Json<Vec<Part>>, AppError> {
    let parts = state.db.list_parts().await?;
    Ok(Json(parts))
}

/// GET /inventory/:id
#[tracing::instrument(skip(state))]
pub async fn get_part(
    State(state): State<AppState>,
    Path(part_id): Path<Uuid>,
) -> Result<Json<Part>, AppError> {
    let part = state
        .db
        .get_part(part_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Part not found")))?;
    Ok(Json(part))
}

/// POST /inventory
#[tracing::instrument(skip(state, req), fields(part_number = %req.part_number))]
pub async fn create_part(
    State(state): State<AppState>,
    Json(req): Json<CreatePartRequest>,
) -> Result<(StatusCode, Json<Part>), AppError> {
    if req.part_name.trim().is_empty() || req.part_number.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing required fields"
        )));
    }
    req.validate()?;
    validate_discount(req.discount)?;

    let part = state
        .db
        .create_part(&CreatePart {
            part_name: req.part_name,
            part_number: req.part_number,
            brand: req.brand,
            cost: req.cost.unwrap_or(Decimal::ZERO),
            discount: req.discount.unwrap_or(Decimal::ZERO),
            quantity: req.quantity.unwrap_or(0),
            category: req.category,
            supplier: req.supplier,
            features: req.features,
            min_stock_level: req.min_stock_level.unwrap_or(0),
            created_by: req.created_by,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(part)))
}

/// PUT /inventory/:id
#[tracing::instrument(skip(state, req))]
pub async fn update_part(
    State(state): State<AppState>,
    Path(part_id): Path<Uuid>,
    Json(req): Json<UpdatePartRequest>,
) -> Result<Json<Part>, AppError> {
    req.validate()?;
    validate_discount(req.discount)?;

    let part = state
        .db
        .update_part(
            part_id,
            &UpdatePart {
                part_name: req.part_name,
                part_number: req.part_number,
                brand: req.brand,
                cost: req.cost,
                discount: req.discount,
                quantity: req.quantity,
                category: req.category,
                supplier: req.supplier,
                features: req.features,
                min_stock_level: req.min_stock_level,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Part not found")))?;

    Ok(Json(part))
}

/// DELETE /inventory/:id
#[tracing::instrument(skip(state))]
pub async fn delete_part(
    State(state): State<AppState>,
    Path(part_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = state.db.delete_part(part_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Part not found")));
    }
    Ok(Json(MessageResponse::new("Part deleted successfully")))
}

/// GET /inventory/search/:query
#[tracing::instrument(skip(state))]
pub async fn search_parts(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<Vec<Part>>, AppError> {
    let parts = state.db.search_parts(&query).await?;
    Ok(Json(parts))
}

/// GET /inventory/low-stock/items
#[tracing::instrument(skip(state))]
pub async fn low_stock(State(state): State<AppState>) -> Result<Json<Vec<Part>>, AppError> {
    let parts = state.db.low_stock_parts().await?;
    Ok(Json(parts))
}

/// POST /inventory/:id/adjust
#[tracing::instrument(skip(state, req), fields(delta = req.delta))]
pub async fn adjust_quantity(
    State(state): State<AppState>,
    Path(part_id): Path<Uuid>,
    Json(req): Json<AdjustQuantityRequest>,
) -> Result<Json<Part>, AppError> {
    if req.delta == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Adjustment delta cannot be zero"
        )));
    }

    let reason = match req.reason.as_deref() {
        None => {
            if req.delta >= 0 {
                MovementType::Buy
            } else {
                MovementType::Sell
            }
        }
        Some(s) => match MovementType::parse(s) {
            Some(MovementType::Payment) | None => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Adjustment reason must be 'buy' or 'sell'"
                )))
            }
            Some(reason) => reason,
        },
    };

    let part = state.db.adjust_quantity(part_id, req.delta, reason).await?;
    Ok(Json(part))
}

fn validate_discount(discount: Option<Decimal>) -> Result<(), AppError> {
    if let Some(discount) = discount {
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount must be between 0 and 100"
            )));
        }
    }
    Ok(())
}
