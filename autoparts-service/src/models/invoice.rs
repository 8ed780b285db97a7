//! Invoice model and payment-status state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::LineItem;

/// Invoice payment status. Transitions move forward (`pending` → `partial` →
/// `paid`) as payments accumulate; the manual status override endpoint may
/// set any value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Lenient decoding for stored values.
    pub fn from_string(s: &str) -> Self {
        match s {
            "partial" => InvoiceStatus::Partial,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Strict parsing for caller-supplied values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "partial" => Some(InvoiceStatus::Partial),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }

    /// Derive the status from cumulative paid amount versus the grand total:
    /// `paid` iff paid >= total, `partial` iff 0 < paid < total, else
    /// `pending`.
    pub fn derive(paid_amount: Decimal, grand_total: Decimal) -> Self {
        if paid_amount >= grand_total {
            InvoiceStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Pending
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice document. `grand_total = subtotal + tax_amount` and `subtotal`
/// equals the sum of its line totals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub paid_amount: Decimal,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn parsed_status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn outstanding(&self) -> Decimal {
        self.grand_total - self.paid_amount
    }
}

/// Invoice with its line items attached, as returned by the API and held by
/// the mirror store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
}

/// One requested sale line. When `unit_price` is absent the part's current
/// cost is snapshotted at creation time.
#[derive(Debug, Clone)]
pub struct CreateInvoiceLine {
    pub part_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// Input for creating an invoice together with its stock reservation.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub lines: Vec<CreateInvoiceLine>,
    pub tax_rate: Decimal,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}
