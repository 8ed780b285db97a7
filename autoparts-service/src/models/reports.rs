//! Aggregation row types for reporting queries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// One day of invoicing activity.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SalesSummaryRow {
    pub date: NaiveDate,
    pub invoice_count: i64,
    pub total_revenue: Decimal,
    pub average_invoice: Decimal,
    pub paid_invoices: i64,
}

/// Stock position per category.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventorySummaryRow {
    pub category: Option<String>,
    pub total_parts: i64,
    pub total_quantity: i64,
    pub total_value: Decimal,
    pub low_stock_items: i64,
}

/// Payment volume per method.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentMethodSummaryRow {
    pub payment_method: String,
    pub total_payments: i64,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
}

/// Customer identity as derived from the invoices they appear on.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerSummary {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

/// One invoice in a customer's purchase history, with item counts.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerHistoryRow {
    pub invoice_id: uuid::Uuid,
    pub invoice_number: String,
    pub status: String,
    pub grand_total: Decimal,
    pub paid_amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub item_count: i64,
    pub total_items: i64,
}

/// Aggregate purchasing statistics for one customer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerStatistics {
    pub customer_name: String,
    pub total_invoices: i64,
    pub total_spent: Decimal,
    pub average_invoice: Decimal,
    pub last_purchase: DateTime<Utc>,
}
