//! Stock movement (audit) model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of audited event: stock received, stock sold, or a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Buy,
    Sell,
    Payment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Buy => "buy",
            MovementType::Sell => "sell",
            MovementType::Payment => "payment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(MovementType::Buy),
            "sell" => Some(MovementType::Sell),
            "payment" => Some(MovementType::Payment),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit entry. Every inventory mutation and every payment
/// produces one; the log keeps only the most recent 1000 entries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMovement {
    pub movement_id: Uuid,
    pub movement_type: String,
    pub part_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub quantity_before: Option<i32>,
    pub quantity_after: Option<i32>,
    pub quantity_delta: Option<i32>,
    pub amount: Option<Decimal>,
    pub created_utc: DateTime<Utc>,
}

impl StockMovement {
    pub fn parsed_type(&self) -> Option<MovementType> {
        MovementType::parse(&self.movement_type)
    }
}

/// Input for appending an audit entry.
#[derive(Debug, Clone)]
pub struct RecordMovement {
    pub movement_type: MovementType,
    pub part_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub quantity_before: Option<i32>,
    pub quantity_after: Option<i32>,
    pub quantity_delta: Option<i32>,
    pub amount: Option<Decimal>,
}
