//! Request and response bodies for the REST surface.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, message = "Part name is required"))]
    pub part_name: String,

    #[validate(length(min = 1, message = "Part number is required"))]
    pub part_number: String,

    pub brand: Option<String>,
    pub cost: Option<Decimal>,
    pub discount: Option<Decimal>,

    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,

    pub category: Option<String>,
    pub supplier: Option<String>,
    pub features: Option<String>,

    #[validate(range(min = 0, message = "Minimum stock level cannot be negative"))]
    pub min_stock_level: Option<i32>,

    pub created_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdatePartRequest {
    pub part_name: Option<String>,
    pub part_number: Option<String>,
    pub brand: Option<String>,
    pub cost: Option<Decimal>,
    pub discount: Option<Decimal>,

    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,

    pub category: Option<String>,
    pub supplier: Option<String>,
    pub features: Option<String>,

    #[validate(range(min = 0, message = "Minimum stock level cannot be negative"))]
    pub min_stock_level: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustQuantityRequest {
    pub delta: i32,
    /// "buy" or "sell"; defaults by the sign of `delta`.
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InvoiceItemRequest {
    pub part_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub customer_email: Option<String>,

    pub customer_phone: Option<String>,

    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<InvoiceItemRequest>,

    pub tax_rate: Option<Decimal>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub invoice_id: Option<Uuid>,
    pub invoice_number: Option<String>,

    #[validate(length(min = 1, message = "Payer name is required"))]
    pub payer_name: String,

    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
