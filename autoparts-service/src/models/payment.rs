//! Payment model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Check,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Check => "check",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "check" => Some(PaymentMethod::Check),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded payment. The invoice linkage is deliberately loose: a payment
/// may reference an invoice that no longer exists, or none at all.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub payer_name: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub recorded_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub invoice_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub payer_name: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
}
