//! Invoice line-item model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One (part, quantity, price) entry on an invoice. The unit price is a
/// snapshot taken at sale time, not the part's live cost, and the row is
/// immutable once the invoice exists.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub part_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub created_utc: DateTime<Utc>,
}
