//! Part (inventory SKU) model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Inventory part. `quantity` is quantity-on-hand and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Part {
    pub part_id: Uuid,
    pub part_name: String,
    pub part_number: String,
    pub brand: Option<String>,
    pub cost: Decimal,
    pub discount: Decimal,
    pub quantity: i32,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub features: Option<String>,
    pub min_stock_level: i32,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: Option<DateTime<Utc>>,
}

impl Part {
    /// A part is low on stock when on-hand quantity has fallen to the
    /// configured minimum level or below.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }

    /// Effective sale price after the configured discount percentage.
    pub fn discounted_cost(&self) -> Decimal {
        let factor = (Decimal::ONE_HUNDRED - self.discount) / Decimal::ONE_HUNDRED;
        (self.cost * factor).round_dp(2)
    }
}

/// Input for creating a part.
#[derive(Debug, Clone)]
pub struct CreatePart {
    pub part_name: String,
    pub part_number: String,
    pub brand: Option<String>,
    pub cost: Decimal,
    pub discount: Decimal,
    pub quantity: i32,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub features: Option<String>,
    pub min_stock_level: i32,
    pub created_by: Option<Uuid>,
}

/// Input for a partial part update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdatePart {
    pub part_name: Option<String>,
    pub part_number: Option<String>,
    pub brand: Option<String>,
    pub cost: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub quantity: Option<i32>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub features: Option<String>,
    pub min_stock_level: Option<i32>,
}
