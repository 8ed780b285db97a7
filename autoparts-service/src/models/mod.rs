//! Domain models for the auto-parts service.

mod invoice;
mod line_item;
mod part;
mod payment;
mod reports;
mod stock_movement;

pub use invoice::{
    CreateInvoice, CreateInvoiceLine, Invoice, InvoiceStatus, InvoiceWithItems,
};
pub use line_item::LineItem;
pub use part::{CreatePart, Part, UpdatePart};
pub use payment::{CreatePayment, Payment, PaymentMethod};
pub use reports::{
    CustomerHistoryRow, CustomerStatistics, CustomerSummary, InventorySummaryRow,
    PaymentMethodSummaryRow, SalesSummaryRow,
};
pub use stock_movement::{MovementType, RecordMovement, StockMovement};
