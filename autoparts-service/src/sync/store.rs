//! The mirror store: inventory, invoices, payments and the bounded audit log
//! over injected snapshot storage.

use std::collections::{HashMap, VecDeque};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{
    CreateInvoice, CreatePart, CreatePayment, Invoice, InvoiceStatus, InvoiceWithItems, LineItem,
    MovementType, Part, Payment, RecordMovement, StockMovement,
};

use super::hub::{ChangeEvent, ChangeHub, Collection};
use super::storage::SnapshotStorage;

/// How many audit entries the log retains; oldest evicted first.
const TRANSACTION_LOG_CAPACITY: usize = 1000;

/// Aggregate stock position.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryStats {
    pub total_items: usize,
    pub total_quantity: i64,
    pub total_value: Decimal,
    pub low_stock_count: usize,
    pub average_value: Decimal,
}

/// Sales volume over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct SalesStats {
    pub total_sales: usize,
    pub total_amount: Decimal,
    pub total_quantity_sold: i64,
    pub average_sale_value: Decimal,
}

/// Payment volume over a trailing window, plus outstanding balance.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStats {
    pub total_payments: usize,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub average_payment: Decimal,
}

/// One line of a pending sale inside the store.
struct SaleLine {
    part_id: Uuid,
    quantity: i32,
    amount: Option<Decimal>,
    invoice_id: Option<Uuid>,
}

/// Mirror of the inventory/invoice/payment state with write-through snapshot
/// persistence and synchronous change notification. Constructed explicitly
/// with its storage; consumers hold a reference rather than importing a
/// singleton.
pub struct SyncStore {
    storage: Box<dyn SnapshotStorage>,
    hub: ChangeHub,
    parts: Vec<Part>,
    invoices: Vec<InvoiceWithItems>,
    payments: Vec<Payment>,
    movements: VecDeque<StockMovement>,
    invoice_seq: u64,
}

impl SyncStore {
    /// Build the store, re-deriving the whole view from storage. Snapshots
    /// that fail to parse are logged and treated as empty.
    pub fn new(storage: Box<dyn SnapshotStorage>) -> Self {
        let parts: Vec<Part> = load_collection(storage.as_ref(), Collection::Inventory);
        let invoices: Vec<InvoiceWithItems> =
            load_collection(storage.as_ref(), Collection::Invoices);
        let payments: Vec<Payment> = load_collection(storage.as_ref(), Collection::Payments);
        let movements: Vec<StockMovement> =
            load_collection(storage.as_ref(), Collection::Transactions);

        let invoice_seq = invoices
            .iter()
            .filter_map(|i| invoice_number_suffix(&i.invoice.invoice_number))
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);

        Self {
            storage,
            hub: ChangeHub::default(),
            parts,
            invoices,
            payments,
            movements: movements.into(),
            invoice_seq,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.hub.subscribe()
    }

    // -------------------------------------------------------------------------
    // Read accessors
    // -------------------------------------------------------------------------

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn get_part(&self, part_id: Uuid) -> Option<&Part> {
        self.parts.iter().find(|p| p.part_id == part_id)
    }

    pub fn invoices(&self) -> &[InvoiceWithItems] {
        &self.invoices
    }

    pub fn get_invoice(&self, invoice_id: Uuid) -> Option<&InvoiceWithItems> {
        self.invoices
            .iter()
            .find(|i| i.invoice.invoice_id == invoice_id)
    }

    pub fn invoices_by_status(&self, status: InvoiceStatus) -> Vec<&InvoiceWithItems> {
        self.invoices
            .iter()
            .filter(|i| i.invoice.parsed_status() == status)
            .collect()
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn payments_for_invoice(&self, invoice_id: Uuid) -> Vec<&Payment> {
        self.payments
            .iter()
            .filter(|p| p.invoice_id == Some(invoice_id))
            .collect()
    }

    /// Most recent audit entries, newest first.
    pub fn transactions(&self, limit: usize) -> Vec<&StockMovement> {
        self.movements.iter().rev().take(limit).collect()
    }

    pub fn transactions_by_type(&self, movement_type: MovementType) -> Vec<&StockMovement> {
        self.movements
            .iter()
            .filter(|m| m.parsed_type() == Some(movement_type))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Inventory operations
    // -------------------------------------------------------------------------

    /// Add a new part to the mirror.
    pub fn add_part(&mut self, input: CreatePart) -> Result<Part, AppError> {
        if self.parts.iter().any(|p| p.part_number == input.part_number) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Part number '{}' already exists",
                input.part_number
            )));
        }

        let part = Part {
            part_id: Uuid::new_v4(),
            part_name: input.part_name,
            part_number: input.part_number,
            brand: input.brand,
            cost: input.cost,
            discount: input.discount,
            quantity: input.quantity,
            category: input.category,
            supplier: input.supplier,
            features: input.features,
            min_stock_level: input.min_stock_level,
            created_by: input.created_by,
            created_utc: Utc::now(),
            updated_utc: None,
        };

        self.parts.push(part.clone());
        self.persist(Collection::Inventory)?;
        self.hub.publish(Collection::Inventory);

        Ok(part)
    }

    /// Adjust a part's quantity by a signed delta. An adjustment that would
    /// take the quantity below zero is rejected with no effect.
    pub fn adjust_quantity(
        &mut self,
        part_id: Uuid,
        delta: i32,
        reason: MovementType,
    ) -> Result<Part, AppError> {
        let part = self
            .parts
            .iter_mut()
            .find(|p| p.part_id == part_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Part not found")))?;

        let before = part.quantity;
        let after = before + delta;
        if after < 0 {
            return Err(AppError::InsufficientStock(anyhow::anyhow!(
                "Adjustment of {} would underflow stock of {} (available {})",
                delta,
                part.part_name,
                before
            )));
        }

        part.quantity = after;
        part.updated_utc = Some(Utc::now());
        let updated = part.clone();

        self.append_movement(RecordMovement {
            movement_type: reason,
            part_id: Some(part_id),
            invoice_id: None,
            quantity_before: Some(before),
            quantity_after: Some(after),
            quantity_delta: Some(delta),
            amount: None,
        });

        self.persist(Collection::Inventory)?;
        self.hub.publish(Collection::Inventory);

        Ok(updated)
    }

    /// Record received stock.
    pub fn receive_stock(&mut self, part_id: Uuid, quantity: i32) -> Result<Part, AppError> {
        self.adjust_quantity(part_id, quantity, MovementType::Buy)
    }

    /// Reserve stock for a sale: validate every line before decrementing any,
    /// then apply all decrements. All-or-nothing.
    pub fn reserve_for_sale(&mut self, lines: &[(Uuid, i32)]) -> Result<(), AppError> {
        let sale: Vec<SaleLine> = lines
            .iter()
            .map(|&(part_id, quantity)| SaleLine {
                part_id,
                quantity,
                amount: None,
                invoice_id: None,
            })
            .collect();

        self.check_availability(&sale)?;
        self.apply_sale(&sale);

        self.persist(Collection::Inventory)?;
        self.hub.publish(Collection::Inventory);

        Ok(())
    }

    /// Validation pass: every line must be satisfiable, counting repeated
    /// lines for the same part against the same on-hand quantity. No line is
    /// mutated.
    fn check_availability(&self, lines: &[SaleLine]) -> Result<(), AppError> {
        let mut requested: HashMap<Uuid, i32> = HashMap::new();
        for line in lines {
            *requested.entry(line.part_id).or_insert(0) += line.quantity;
        }

        for (part_id, quantity) in requested {
            let part = self
                .get_part(part_id)
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Part {} not found", part_id)))?;
            if part.quantity < quantity {
                return Err(AppError::InsufficientStock(anyhow::anyhow!(
                    "Insufficient stock for {}: available {}, requested {}",
                    part.part_name,
                    part.quantity,
                    quantity
                )));
            }
        }
        Ok(())
    }

    /// Decrement pass. Callers must have validated availability first.
    fn apply_sale(&mut self, lines: &[SaleLine]) {
        for line in lines {
            let Some(part) = self.parts.iter_mut().find(|p| p.part_id == line.part_id) else {
                continue;
            };
            let before = part.quantity;
            part.quantity = before - line.quantity;
            part.updated_utc = Some(Utc::now());
            let after = part.quantity;

            self.append_movement(RecordMovement {
                movement_type: MovementType::Sell,
                part_id: Some(line.part_id),
                invoice_id: line.invoice_id,
                quantity_before: Some(before),
                quantity_after: Some(after),
                quantity_delta: Some(-line.quantity),
                amount: line.amount,
            });
        }
    }

    // -------------------------------------------------------------------------
    // Invoice operations
    // -------------------------------------------------------------------------

    /// Create an invoice and reserve stock for its lines. Validation and the
    /// availability check run before any state changes, so a failure leaves
    /// the mirror untouched.
    pub fn create_invoice(&mut self, input: CreateInvoice) -> Result<InvoiceWithItems, AppError> {
        if input.customer_name.trim().is_empty() || input.lines.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing required fields"
            )));
        }

        let invoice_id = Uuid::new_v4();
        let now = Utc::now();

        // Price the lines first; availability is validated over the whole
        // set before anything mutates.
        let mut items: Vec<LineItem> = Vec::with_capacity(input.lines.len());
        let mut sale: Vec<SaleLine> = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let part = self.get_part(line.part_id).ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Part {} not found", line.part_id))
            })?;

            let unit_price = line.unit_price.unwrap_or_else(|| part.discounted_cost());
            let line_total = (unit_price * Decimal::from(line.quantity)).round_dp(2);
            items.push(LineItem {
                line_item_id: Uuid::new_v4(),
                invoice_id,
                part_id: line.part_id,
                quantity: line.quantity,
                unit_price,
                line_total,
                created_utc: now,
            });
            sale.push(SaleLine {
                part_id: line.part_id,
                quantity: line.quantity,
                amount: Some(line_total),
                invoice_id: Some(invoice_id),
            });
        }

        self.check_availability(&sale)?;

        let subtotal: Decimal = items.iter().map(|i| i.line_total).sum();
        let tax_amount = (subtotal * input.tax_rate / Decimal::ONE_HUNDRED).round_dp(2);
        let grand_total = subtotal + tax_amount;

        let invoice_number = format!("INV-{:06}", self.invoice_seq);
        self.invoice_seq += 1;

        self.apply_sale(&sale);

        let invoice = InvoiceWithItems {
            invoice: Invoice {
                invoice_id,
                invoice_number,
                customer_name: input.customer_name,
                customer_email: input.customer_email,
                customer_phone: input.customer_phone,
                subtotal,
                tax_rate: input.tax_rate,
                tax_amount,
                grand_total,
                paid_amount: Decimal::ZERO,
                payment_method: input.payment_method,
                notes: input.notes,
                status: InvoiceStatus::Pending.as_str().to_string(),
                created_by: input.created_by,
                created_utc: now,
                updated_utc: None,
            },
            items,
        };

        self.invoices.push(invoice.clone());
        self.persist(Collection::Inventory)?;
        self.persist(Collection::Invoices)?;
        self.hub.publish(Collection::Inventory);
        self.hub.publish(Collection::Invoices);

        Ok(invoice)
    }

    /// Manual status override; bypasses the payment-derived state machine.
    pub fn update_invoice_status(
        &mut self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<InvoiceWithItems, AppError> {
        let entry = self
            .invoices
            .iter_mut()
            .find(|i| i.invoice.invoice_id == invoice_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        entry.invoice.status = status.as_str().to_string();
        entry.invoice.updated_utc = Some(Utc::now());
        let updated = entry.clone();

        self.persist(Collection::Invoices)?;
        self.hub.publish(Collection::Invoices);

        Ok(updated)
    }

    /// Delete an invoice, restoring the stock its lines reserved.
    pub fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<(), AppError> {
        let index = self
            .invoices
            .iter()
            .position(|i| i.invoice.invoice_id == invoice_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let removed = self.invoices.remove(index);
        for item in &removed.items {
            let restored = self
                .parts
                .iter_mut()
                .find(|p| p.part_id == item.part_id)
                .map(|part| {
                    let before = part.quantity;
                    part.quantity = before + item.quantity;
                    part.updated_utc = Some(Utc::now());
                    (before, part.quantity)
                });

            match restored {
                Some((before, after)) => {
                    self.append_movement(RecordMovement {
                        movement_type: MovementType::Buy,
                        part_id: Some(item.part_id),
                        invoice_id: Some(invoice_id),
                        quantity_before: Some(before),
                        quantity_after: Some(after),
                        quantity_delta: Some(item.quantity),
                        amount: Some(item.line_total),
                    });
                }
                None => {
                    warn!(part_id = %item.part_id, "Cannot restore stock for missing part");
                }
            }
        }

        self.persist(Collection::Inventory)?;
        self.persist(Collection::Invoices)?;
        self.hub.publish(Collection::Inventory);
        self.hub.publish(Collection::Invoices);

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payment operations
    // -------------------------------------------------------------------------

    /// Record a payment. When the referenced invoice exists, its paid amount
    /// is recomputed from the full payment set and its status re-derived. A
    /// missing invoice is tolerated: the payment is recorded regardless.
    pub fn record_payment(&mut self, input: CreatePayment) -> Result<Payment, AppError> {
        if input.payer_name.trim().is_empty() || input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing required fields"
            )));
        }

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            invoice_id: input.invoice_id,
            invoice_number: input.invoice_number,
            payer_name: input.payer_name,
            amount: input.amount,
            payment_method: input.payment_method.as_str().to_string(),
            reference: input.reference,
            notes: input.notes,
            status: "confirmed".to_string(),
            recorded_by: input.recorded_by,
            created_utc: Utc::now(),
        };

        self.payments.push(payment.clone());

        if let Some(invoice_id) = input.invoice_id {
            let paid_amount: Decimal = self
                .payments
                .iter()
                .filter(|p| p.invoice_id == Some(invoice_id))
                .map(|p| p.amount)
                .sum();

            let applied = self
                .invoices
                .iter_mut()
                .find(|i| i.invoice.invoice_id == invoice_id)
                .map(|entry| {
                    let status = InvoiceStatus::derive(paid_amount, entry.invoice.grand_total);
                    entry.invoice.paid_amount = paid_amount;
                    entry.invoice.status = status.as_str().to_string();
                    entry.invoice.updated_utc = Some(Utc::now());
                })
                .is_some();

            if applied {
                self.persist(Collection::Invoices)?;
                self.hub.publish(Collection::Invoices);
            } else {
                warn!(
                    invoice_id = %invoice_id,
                    "Payment references a missing invoice; recording payment anyway"
                );
            }
        }

        self.append_movement(RecordMovement {
            movement_type: MovementType::Payment,
            part_id: None,
            invoice_id: payment.invoice_id,
            quantity_before: None,
            quantity_after: None,
            quantity_delta: None,
            amount: Some(payment.amount),
        });

        self.persist(Collection::Payments)?;
        self.hub.publish(Collection::Payments);

        Ok(payment)
    }

    // -------------------------------------------------------------------------
    // Analytics
    // -------------------------------------------------------------------------

    pub fn inventory_stats(&self) -> InventoryStats {
        let total_items = self.parts.len();
        let total_quantity: i64 = self.parts.iter().map(|p| p.quantity as i64).sum();
        let total_value: Decimal = self
            .parts
            .iter()
            .map(|p| p.cost * Decimal::from(p.quantity))
            .sum();
        let low_stock_count = self.parts.iter().filter(|p| p.is_low_stock()).count();
        let average_value = if total_items > 0 {
            (total_value / Decimal::from(total_items as u64)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        InventoryStats {
            total_items,
            total_quantity,
            total_value,
            low_stock_count,
            average_value,
        }
    }

    pub fn sales_stats(&self, days: i64) -> SalesStats {
        let cutoff = Utc::now() - Duration::days(days);
        let sold: Vec<&StockMovement> = self
            .movements
            .iter()
            .filter(|m| m.parsed_type() == Some(MovementType::Sell) && m.created_utc >= cutoff)
            .collect();

        let total_sales = sold.len();
        let total_amount: Decimal = sold.iter().filter_map(|m| m.amount).sum();
        let total_quantity_sold: i64 = sold
            .iter()
            .filter_map(|m| m.quantity_delta)
            .map(|d| d.unsigned_abs() as i64)
            .sum();
        let average_sale_value = if total_sales > 0 {
            (total_amount / Decimal::from(total_sales as u64)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        SalesStats {
            total_sales,
            total_amount,
            total_quantity_sold,
            average_sale_value,
        }
    }

    pub fn payment_stats(&self, days: i64) -> PaymentStats {
        let cutoff = Utc::now() - Duration::days(days);
        let recent: Vec<&Payment> = self
            .payments
            .iter()
            .filter(|p| p.created_utc >= cutoff)
            .collect();

        let total_payments = recent.len();
        let total_amount: Decimal = recent.iter().map(|p| p.amount).sum();
        let pending_amount = self.total_outstanding();
        let average_payment = if total_payments > 0 {
            (total_amount / Decimal::from(total_payments as u64)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        PaymentStats {
            total_payments,
            total_amount,
            pending_amount,
            average_payment,
        }
    }

    pub fn outstanding_invoices(&self) -> Vec<&InvoiceWithItems> {
        self.invoices
            .iter()
            .filter(|i| i.invoice.parsed_status() != InvoiceStatus::Paid)
            .collect()
    }

    pub fn total_outstanding(&self) -> Decimal {
        self.outstanding_invoices()
            .iter()
            .map(|i| i.invoice.outstanding())
            .sum()
    }

    // -------------------------------------------------------------------------
    // Bulk operations
    // -------------------------------------------------------------------------

    /// Export every collection as one JSON document.
    pub fn export_all(&self) -> serde_json::Value {
        json!({
            "inventory": &self.parts,
            "invoices": &self.invoices,
            "payments": &self.payments,
            "transactions": &self.movements,
            "export_date": Utc::now(),
        })
    }

    /// Replace a whole collection from a JSON snapshot.
    pub fn import_collection(&mut self, collection: Collection, data: &str) -> Result<(), AppError> {
        match collection {
            Collection::Inventory => {
                self.parts = parse_snapshot(data)?;
            }
            Collection::Invoices => {
                self.invoices = parse_snapshot(data)?;
                self.invoice_seq = self
                    .invoices
                    .iter()
                    .filter_map(|i| invoice_number_suffix(&i.invoice.invoice_number))
                    .max()
                    .map(|n| n + 1)
                    .unwrap_or(1);
            }
            Collection::Payments => {
                self.payments = parse_snapshot(data)?;
            }
            Collection::Transactions => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "The audit log cannot be imported"
                )));
            }
        }

        self.persist(collection)?;
        self.hub.publish(collection);
        Ok(())
    }

    /// Drop every collection and its stored snapshot.
    pub fn clear_all(&mut self) -> Result<(), AppError> {
        self.parts.clear();
        self.invoices.clear();
        self.payments.clear();
        self.movements.clear();

        for collection in [
            Collection::Inventory,
            Collection::Invoices,
            Collection::Payments,
            Collection::Transactions,
        ] {
            self.storage.remove(collection.key())?;
            self.hub.publish(collection);
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Append an audit entry, evicting the oldest entries beyond capacity.
    /// Snapshot failures for the log are logged and swallowed; they never
    /// fail the operation that produced the entry.
    fn append_movement(&mut self, input: RecordMovement) {
        self.movements.push_back(StockMovement {
            movement_id: Uuid::new_v4(),
            movement_type: input.movement_type.as_str().to_string(),
            part_id: input.part_id,
            invoice_id: input.invoice_id,
            quantity_before: input.quantity_before,
            quantity_after: input.quantity_after,
            quantity_delta: input.quantity_delta,
            amount: input.amount,
            created_utc: Utc::now(),
        });

        while self.movements.len() > TRANSACTION_LOG_CAPACITY {
            self.movements.pop_front();
        }

        if let Err(e) = self.persist(Collection::Transactions) {
            warn!(error = %e, "Failed to persist audit log snapshot");
        }
        self.hub.publish(Collection::Transactions);
    }

    /// Serialize a collection to its snapshot blob.
    fn persist(&mut self, collection: Collection) -> Result<(), AppError> {
        let blob = match collection {
            Collection::Inventory => serde_json::to_string(&self.parts),
            Collection::Invoices => serde_json::to_string(&self.invoices),
            Collection::Payments => serde_json::to_string(&self.payments),
            Collection::Transactions => serde_json::to_string(&self.movements),
        }
        .map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize snapshot: {}", e))
        })?;

        self.storage.store(collection.key(), &blob)?;
        Ok(())
    }
}

/// Deserialize a JSON snapshot blob into a collection, surfacing parse
/// failures as a client error for the import caller.
fn parse_snapshot<T: DeserializeOwned>(data: &str) -> Result<Vec<T>, AppError> {
    serde_json::from_str(data)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid snapshot: {}", e)))
}

fn load_collection<T: DeserializeOwned>(
    storage: &dyn SnapshotStorage,
    collection: Collection,
) -> Vec<T> {
    let Some(blob) = storage.load(collection.key()) else {
        return Vec::new();
    };
    match serde_json::from_str(&blob) {
        Ok(items) => items,
        Err(e) => {
            warn!(collection = collection.key(), error = %e, "Discarding unreadable snapshot");
            Vec::new()
        }
    }
}

/// Numeric suffix of a generated invoice number, used to seed the counter.
fn invoice_number_suffix(invoice_number: &str) -> Option<u64> {
    invoice_number.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateInvoiceLine, PaymentMethod};
    use crate::sync::MemoryStorage;

    fn test_store() -> SyncStore {
        SyncStore::new(Box::new(MemoryStorage::new()))
    }

    fn seed_part(store: &mut SyncStore, name: &str, number: &str, cost: i64, quantity: i32) -> Part {
        store
            .add_part(CreatePart {
                part_name: name.to_string(),
                part_number: number.to_string(),
                brand: Some("Bosch".to_string()),
                cost: Decimal::from(cost),
                discount: Decimal::ZERO,
                quantity,
                category: Some("brakes".to_string()),
                supplier: None,
                features: None,
                min_stock_level: 2,
                created_by: None,
            })
            .expect("seed part")
    }

    fn invoice_input(customer: &str, lines: Vec<CreateInvoiceLine>, tax_rate: i64) -> CreateInvoice {
        CreateInvoice {
            customer_name: customer.to_string(),
            customer_email: None,
            customer_phone: None,
            lines,
            tax_rate: Decimal::from(tax_rate),
            payment_method: Some("cash".to_string()),
            notes: None,
            created_by: None,
        }
    }

    fn payment_input(invoice_id: Option<Uuid>, payer: &str, amount: Decimal) -> CreatePayment {
        CreatePayment {
            invoice_id,
            invoice_number: None,
            payer_name: payer.to_string(),
            amount,
            payment_method: PaymentMethod::Cash,
            reference: None,
            notes: None,
            recorded_by: None,
        }
    }

    #[test]
    fn invoice_lifecycle_matches_expected_totals() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Brake pad", "BP-1001", 100, 10);

        let invoice = store
            .create_invoice(invoice_input(
                "Asha Motors",
                vec![CreateInvoiceLine {
                    part_id: part.part_id,
                    quantity: 3,
                    unit_price: Some(Decimal::from(100)),
                }],
                18,
            ))
            .expect("create invoice");

        assert_eq!(invoice.invoice.subtotal, Decimal::from(300));
        assert_eq!(invoice.invoice.tax_amount, Decimal::from(54));
        assert_eq!(invoice.invoice.grand_total, Decimal::from(354));
        assert_eq!(invoice.invoice.status, "pending");
        assert_eq!(store.get_part(part.part_id).unwrap().quantity, 7);

        let invoice_id = invoice.invoice.invoice_id;
        store
            .record_payment(payment_input(
                Some(invoice_id),
                "Asha Motors",
                Decimal::from(354),
            ))
            .expect("record payment");

        let paid = store.get_invoice(invoice_id).unwrap();
        assert_eq!(paid.invoice.status, "paid");
        assert_eq!(paid.invoice.paid_amount, Decimal::from(354));

        store.delete_invoice(invoice_id).expect("delete invoice");
        assert_eq!(store.get_part(part.part_id).unwrap().quantity, 10);
        assert!(store.get_invoice(invoice_id).is_none());
    }

    #[test]
    fn invoice_totals_stay_consistent() {
        let mut store = test_store();
        let pads = seed_part(&mut store, "Brake pad", "BP-1002", 100, 20);
        let filters = seed_part(&mut store, "Oil filter", "OF-2002", 35, 20);

        let invoice = store
            .create_invoice(invoice_input(
                "Deluxe Garage",
                vec![
                    CreateInvoiceLine {
                        part_id: pads.part_id,
                        quantity: 2,
                        unit_price: None,
                    },
                    CreateInvoiceLine {
                        part_id: filters.part_id,
                        quantity: 4,
                        unit_price: Some(Decimal::new(3250, 2)),
                    },
                ],
                12,
            ))
            .expect("create invoice");

        let line_sum: Decimal = invoice.items.iter().map(|i| i.line_total).sum();
        assert_eq!(invoice.invoice.subtotal, line_sum);
        assert_eq!(
            invoice.invoice.grand_total,
            invoice.invoice.subtotal + invoice.invoice.tax_amount
        );
    }

    #[test]
    fn insufficient_stock_persists_nothing() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Alternator", "AL-3001", 250, 2);

        let err = store
            .create_invoice(invoice_input(
                "Quick Fit",
                vec![CreateInvoiceLine {
                    part_id: part.part_id,
                    quantity: 5,
                    unit_price: None,
                }],
                18,
            ))
            .expect_err("must fail");

        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.get_part(part.part_id).unwrap().quantity, 2);
        assert!(store.invoices().is_empty());
    }

    #[test]
    fn failing_line_aborts_whole_invoice() {
        let mut store = test_store();
        let a = seed_part(&mut store, "Spark plug", "SP-4001", 12, 10);
        let b = seed_part(&mut store, "Wiper blade", "WB-5001", 18, 10);
        let c = seed_part(&mut store, "Battery", "BT-6001", 90, 2);

        let err = store
            .create_invoice(invoice_input(
                "Roadside Repairs",
                vec![
                    CreateInvoiceLine {
                        part_id: a.part_id,
                        quantity: 1,
                        unit_price: None,
                    },
                    CreateInvoiceLine {
                        part_id: b.part_id,
                        quantity: 1,
                        unit_price: None,
                    },
                    CreateInvoiceLine {
                        part_id: c.part_id,
                        quantity: 5,
                        unit_price: None,
                    },
                ],
                18,
            ))
            .expect_err("third line overdraws");

        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.get_part(a.part_id).unwrap().quantity, 10);
        assert_eq!(store.get_part(b.part_id).unwrap().quantity, 10);
        assert_eq!(store.get_part(c.part_id).unwrap().quantity, 2);
        assert!(store.invoices().is_empty());
        assert!(store.transactions_by_type(MovementType::Sell).is_empty());
    }

    #[test]
    fn create_then_delete_restores_quantities_exactly() {
        let mut store = test_store();
        let a = seed_part(&mut store, "Radiator", "RA-7001", 140, 6);
        let b = seed_part(&mut store, "Hose clamp", "HC-8001", 2, 40);

        let invoice = store
            .create_invoice(invoice_input(
                "Summit Auto",
                vec![
                    CreateInvoiceLine {
                        part_id: a.part_id,
                        quantity: 2,
                        unit_price: None,
                    },
                    CreateInvoiceLine {
                        part_id: b.part_id,
                        quantity: 15,
                        unit_price: None,
                    },
                ],
                18,
            ))
            .expect("create invoice");

        assert_eq!(store.get_part(a.part_id).unwrap().quantity, 4);
        assert_eq!(store.get_part(b.part_id).unwrap().quantity, 25);

        store
            .delete_invoice(invoice.invoice.invoice_id)
            .expect("delete invoice");
        assert_eq!(store.get_part(a.part_id).unwrap().quantity, 6);
        assert_eq!(store.get_part(b.part_id).unwrap().quantity, 40);
    }

    #[test]
    fn payment_recomputation_is_split_insensitive() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Clutch kit", "CK-9001", 200, 10);

        let whole = store
            .create_invoice(invoice_input(
                "Single Payer",
                vec![CreateInvoiceLine {
                    part_id: part.part_id,
                    quantity: 1,
                    unit_price: None,
                }],
                0,
            ))
            .unwrap();
        let split = store
            .create_invoice(invoice_input(
                "Split Payer",
                vec![CreateInvoiceLine {
                    part_id: part.part_id,
                    quantity: 1,
                    unit_price: None,
                }],
                0,
            ))
            .unwrap();

        store
            .record_payment(payment_input(
                Some(whole.invoice.invoice_id),
                "Single Payer",
                Decimal::from(200),
            ))
            .unwrap();
        store
            .record_payment(payment_input(
                Some(split.invoice.invoice_id),
                "Split Payer",
                Decimal::from(100),
            ))
            .unwrap();

        let halfway = store.get_invoice(split.invoice.invoice_id).unwrap();
        assert_eq!(halfway.invoice.status, "partial");

        store
            .record_payment(payment_input(
                Some(split.invoice.invoice_id),
                "Split Payer",
                Decimal::from(100),
            ))
            .unwrap();

        let one = store.get_invoice(whole.invoice.invoice_id).unwrap();
        let two = store.get_invoice(split.invoice.invoice_id).unwrap();
        assert_eq!(one.invoice.status, two.invoice.status);
        assert_eq!(one.invoice.paid_amount, two.invoice.paid_amount);
    }

    #[test]
    fn payment_for_missing_invoice_is_still_recorded() {
        let mut store = test_store();
        let ghost = Uuid::new_v4();

        let payment = store
            .record_payment(payment_input(Some(ghost), "Walk-in", Decimal::from(50)))
            .expect("payment must be recorded");

        assert_eq!(payment.status, "confirmed");
        assert_eq!(store.payments().len(), 1);
        assert!(store.invoices().is_empty());
    }

    #[test]
    fn adjust_quantity_rejects_underflow() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Fan belt", "FB-1101", 15, 2);

        let err = store
            .adjust_quantity(part.part_id, -5, MovementType::Sell)
            .expect_err("underflow must be rejected");
        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.get_part(part.part_id).unwrap().quantity, 2);

        store
            .adjust_quantity(part.part_id, -2, MovementType::Sell)
            .expect("exact drain is fine");
        assert_eq!(store.get_part(part.part_id).unwrap().quantity, 0);
    }

    #[test]
    fn manual_status_override_bypasses_state_machine() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Head gasket", "HG-1201", 75, 5);

        let invoice = store
            .create_invoice(invoice_input(
                "Override Garage",
                vec![CreateInvoiceLine {
                    part_id: part.part_id,
                    quantity: 1,
                    unit_price: None,
                }],
                18,
            ))
            .unwrap();

        let updated = store
            .update_invoice_status(invoice.invoice.invoice_id, InvoiceStatus::Paid)
            .unwrap();
        assert_eq!(updated.invoice.status, "paid");
        assert_eq!(updated.invoice.paid_amount, Decimal::ZERO);
    }

    #[test]
    fn audit_log_keeps_only_newest_thousand() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Washer", "WA-1301", 1, 0);

        for _ in 0..1050 {
            store
                .receive_stock(part.part_id, 1)
                .expect("receive stock");
        }

        let newest_first = store.transactions(2000);
        assert_eq!(newest_first.len(), 1000);
        // 50 oldest evicted: the oldest retained entry is the 51st append.
        let oldest = *newest_first.last().unwrap();
        assert_eq!(oldest.quantity_after, Some(51));
        let newest = *newest_first.first().unwrap();
        assert_eq!(newest.quantity_after, Some(1050));
    }

    #[test]
    fn repeated_lines_for_one_part_are_counted_together() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Timing belt", "TB-2001", 45, 10);

        let err = store
            .create_invoice(invoice_input(
                "Duplicate Lines Garage",
                vec![
                    CreateInvoiceLine {
                        part_id: part.part_id,
                        quantity: 7,
                        unit_price: None,
                    },
                    CreateInvoiceLine {
                        part_id: part.part_id,
                        quantity: 7,
                        unit_price: None,
                    },
                ],
                18,
            ))
            .expect_err("14 of 10 must fail");

        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.get_part(part.part_id).unwrap().quantity, 10);
        assert!(store.invoices().is_empty());
    }

    #[test]
    fn reserve_for_sale_is_all_or_nothing() {
        let mut store = test_store();
        let a = seed_part(&mut store, "Cabin filter", "CF-1601", 22, 8);
        let b = seed_part(&mut store, "Air filter", "AF-1701", 19, 3);

        let err = store
            .reserve_for_sale(&[(a.part_id, 4), (b.part_id, 4)])
            .expect_err("second line overdraws");
        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.get_part(a.part_id).unwrap().quantity, 8);
        assert_eq!(store.get_part(b.part_id).unwrap().quantity, 3);

        store
            .reserve_for_sale(&[(a.part_id, 4), (b.part_id, 3)])
            .expect("both lines fit");
        assert_eq!(store.get_part(a.part_id).unwrap().quantity, 4);
        assert_eq!(store.get_part(b.part_id).unwrap().quantity, 0);
    }

    #[test]
    fn analytics_reflect_activity() {
        let mut store = test_store();
        let part = seed_part(&mut store, "Shock absorber", "SA-1801", 60, 10);

        let invoice = store
            .create_invoice(invoice_input(
                "Stats Garage",
                vec![CreateInvoiceLine {
                    part_id: part.part_id,
                    quantity: 2,
                    unit_price: None,
                }],
                0,
            ))
            .unwrap();
        store
            .record_payment(payment_input(
                Some(invoice.invoice.invoice_id),
                "Stats Garage",
                Decimal::from(60),
            ))
            .unwrap();

        let inventory = store.inventory_stats();
        assert_eq!(inventory.total_items, 1);
        assert_eq!(inventory.total_quantity, 8);
        assert_eq!(inventory.total_value, Decimal::from(480));

        let sales = store.sales_stats(30);
        assert_eq!(sales.total_sales, 1);
        assert_eq!(sales.total_quantity_sold, 2);
        assert_eq!(sales.total_amount, Decimal::from(120));

        let payments = store.payment_stats(30);
        assert_eq!(payments.total_payments, 1);
        assert_eq!(payments.total_amount, Decimal::from(60));
        // 120 invoiced, 60 paid.
        assert_eq!(payments.pending_amount, Decimal::from(60));

        assert_eq!(store.outstanding_invoices().len(), 1);
        assert_eq!(
            store.invoices_by_status(InvoiceStatus::Partial).len(),
            1
        );
        assert_eq!(
            store
                .payments_for_invoice(invoice.invoice.invoice_id)
                .len(),
            1
        );
        assert_eq!(
            store.transactions_by_type(MovementType::Payment).len(),
            1
        );
    }

    #[test]
    fn import_replaces_collection_and_clear_drops_everything() {
        let mut store = test_store();
        seed_part(&mut store, "Bulb", "BU-1901", 3, 50);

        let snapshot = serde_json::to_string(&store.parts()).unwrap();
        let mut other = test_store();
        other
            .import_collection(Collection::Inventory, &snapshot)
            .expect("import inventory");
        assert_eq!(other.parts().len(), 1);

        let err = other
            .import_collection(Collection::Transactions, "[]")
            .expect_err("audit log is not importable");
        assert!(matches!(err, AppError::BadRequest(_)));

        other.clear_all().expect("clear");
        assert!(other.parts().is_empty());
        assert!(other.invoices().is_empty());
        assert!(other.payments().is_empty());
        assert!(other.transactions(10).is_empty());
    }

    #[test]
    fn subscribers_see_mutations() {
        let mut store = test_store();
        let mut rx = store.subscribe();

        seed_part(&mut store, "Mirror", "MI-1401", 30, 3);

        let event = rx.try_recv().expect("one event pending");
        assert_eq!(event.collection, Collection::Inventory);
    }

    #[test]
    fn state_reloads_from_storage() {
        let mut storage = MemoryStorage::new();
        let snapshot;
        {
            let mut store = SyncStore::new(Box::new(MemoryStorage::new()));
            let part = seed_part(&mut store, "Gasket", "GA-1501", 8, 12);
            store
                .create_invoice(invoice_input(
                    "Reload Garage",
                    vec![CreateInvoiceLine {
                        part_id: part.part_id,
                        quantity: 2,
                        unit_price: None,
                    }],
                    18,
                ))
                .unwrap();
            snapshot = store.export_all();
        }

        storage
            .store(
                Collection::Inventory.key(),
                &snapshot["inventory"].to_string(),
            )
            .unwrap();
        storage
            .store(
                Collection::Invoices.key(),
                &snapshot["invoices"].to_string(),
            )
            .unwrap();

        let reloaded = SyncStore::new(Box::new(storage));
        assert_eq!(reloaded.parts().len(), 1);
        assert_eq!(reloaded.invoices().len(), 1);
        assert_eq!(reloaded.parts()[0].quantity, 10);

        // The seeded counter continues past the loaded invoice numbers.
        assert_eq!(reloaded.invoices()[0].invoice.invoice_number, "INV-000001");
    }
}
