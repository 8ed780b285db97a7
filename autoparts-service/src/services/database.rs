//! Database service: the transactional store behind the REST surface.
//!
//! Invoice creation, invoice deletion and payment recording each run inside a
//! single PostgreSQL transaction; quantity decrements are conditional single
//! UPDATEs with affected-row checks so concurrent sales of the last unit
//! resolve to an insufficient-stock error rather than oversell.

use crate::models::{
    CreateInvoice, CreatePart, CreatePayment, CustomerHistoryRow, CustomerStatistics,
    CustomerSummary, InventorySummaryRow, Invoice, InvoiceStatus, InvoiceWithItems, LineItem,
    MovementType, Part, Payment, PaymentMethodSummaryRow, RecordMovement, SalesSummaryRow,
    StockMovement, UpdatePart,
};
use crate::services::metrics::{
    DB_QUERY_DURATION, INVOICES_TOTAL, PAYMENTS_TOTAL, STOCK_MOVEMENTS_TOTAL,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const PART_COLUMNS: &str = "part_id, part_name, part_number, brand, cost, discount, quantity, \
     category, supplier, features, min_stock_level, created_by, created_utc, updated_utc";

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, customer_name, customer_email, \
     customer_phone, subtotal, tax_rate, tax_amount, grand_total, paid_amount, payment_method, \
     notes, status, created_by, created_utc, updated_utc";

const LINE_ITEM_COLUMNS: &str =
    "line_item_id, invoice_id, part_id, quantity, unit_price, line_total, created_utc";

const PAYMENT_COLUMNS: &str = "payment_id, invoice_id, invoice_number, payer_name, amount, \
     payment_method, reference, notes, status, recorded_by, created_utc";

const MOVEMENT_COLUMNS: &str = "movement_id, movement_type, part_id, invoice_id, \
     quantity_before, quantity_after, quantity_delta, amount, created_utc";

/// How many audit entries the movement log retains.
const MOVEMENT_LOG_CAPACITY: i64 = 1000;

/// A line priced for sale, after the reservation pre-check.
struct PricedLine {
    part_id: Uuid,
    part_name: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "autoparts-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Part Operations
    // -------------------------------------------------------------------------

    /// Create a new part.
    #[instrument(skip(self, input), fields(part_number = %input.part_number))]
    pub async fn create_part(&self, input: &CreatePart) -> Result<Part, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_part"])
            .start_timer();

        let part_id = Uuid::new_v4();
        let part = sqlx::query_as::<_, Part>(&format!(
            r#"
            INSERT INTO parts (
                part_id, part_name, part_number, brand, cost, discount, quantity,
                category, supplier, features, min_stock_level, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PART_COLUMNS}
            "#
        ))
        .bind(part_id)
        .bind(&input.part_name)
        .bind(&input.part_number)
        .bind(&input.brand)
        .bind(input.cost)
        .bind(input.discount)
        .bind(input.quantity)
        .bind(&input.category)
        .bind(&input.supplier)
        .bind(&input.features)
        .bind(input.min_stock_level)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Part number '{}' already exists",
                    input.part_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create part: {}", e)),
        })?;

        timer.observe_duration();

        info!(part_id = %part.part_id, part_number = %part.part_number, "Part created");

        Ok(part)
    }

    /// Get a part by ID.
    #[instrument(skip(self), fields(part_id = %part_id))]
    pub async fn get_part(&self, part_id: Uuid) -> Result<Option<Part>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_part"])
            .start_timer();

        let part = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE part_id = $1"
        ))
        .bind(part_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get part: {}", e)))?;

        timer.observe_duration();

        Ok(part)
    }

    /// List all parts, newest first.
    #[instrument(skip(self))]
    pub async fn list_parts(&self) -> Result<Vec<Part>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_parts"])
            .start_timer();

        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts ORDER BY created_utc DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list parts: {}", e)))?;

        timer.observe_duration();

        Ok(parts)
    }

    /// Update a part. `None` fields keep their stored value.
    #[instrument(skip(self, input), fields(part_id = %part_id))]
    pub async fn update_part(
        &self,
        part_id: Uuid,
        input: &UpdatePart,
    ) -> Result<Option<Part>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_part"])
            .start_timer();

        let part = sqlx::query_as::<_, Part>(&format!(
            r#"
            UPDATE parts
            SET part_name = COALESCE($2, part_name),
                part_number = COALESCE($3, part_number),
                brand = COALESCE($4, brand),
                cost = COALESCE($5, cost),
                discount = COALESCE($6, discount),
                quantity = COALESCE($7, quantity),
                category = COALESCE($8, category),
                supplier = COALESCE($9, supplier),
                features = COALESCE($10, features),
                min_stock_level = COALESCE($11, min_stock_level),
                updated_utc = NOW()
            WHERE part_id = $1
            RETURNING {PART_COLUMNS}
            "#
        ))
        .bind(part_id)
        .bind(&input.part_name)
        .bind(&input.part_number)
        .bind(&input.brand)
        .bind(input.cost)
        .bind(input.discount)
        .bind(input.quantity)
        .bind(&input.category)
        .bind(&input.supplier)
        .bind(&input.features)
        .bind(input.min_stock_level)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Part number already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update part: {}", e)),
        })?;

        timer.observe_duration();

        if let Some(ref p) = part {
            info!(part_id = %p.part_id, "Part updated");
        }

        Ok(part)
    }

    /// Delete a part. Deletion is blocked while invoice line items still
    /// reference the part, so historical snapshots are never orphaned.
    #[instrument(skip(self), fields(part_id = %part_id))]
    pub async fn delete_part(&self, part_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_part"])
            .start_timer();

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM invoice_line_items WHERE part_id = $1)",
        )
        .bind(part_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check part references: {}", e))
        })?;

        if referenced {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Part is referenced by existing invoices and cannot be deleted"
            )));
        }

        let result = sqlx::query("DELETE FROM parts WHERE part_id = $1")
            .bind(part_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete part: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(part_id = %part_id, "Part deleted");
        }

        Ok(deleted)
    }

    /// Search parts by name, number or brand (case-insensitive substring).
    #[instrument(skip(self))]
    pub async fn search_parts(&self, query: &str) -> Result<Vec<Part>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["search_parts"])
            .start_timer();

        let pattern = format!("%{}%", query);
        let parts = sqlx::query_as::<_, Part>(&format!(
            r#"
            SELECT {PART_COLUMNS} FROM parts
            WHERE part_name ILIKE $1 OR part_number ILIKE $1 OR brand ILIKE $1
            ORDER BY created_utc DESC
            "#
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to search parts: {}", e)))?;

        timer.observe_duration();

        Ok(parts)
    }

    /// List parts at or below their minimum stock level.
    #[instrument(skip(self))]
    pub async fn low_stock_parts(&self) -> Result<Vec<Part>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["low_stock_parts"])
            .start_timer();

        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE quantity <= min_stock_level ORDER BY quantity ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list low stock parts: {}", e))
        })?;

        timer.observe_duration();

        Ok(parts)
    }

    /// Adjust a part's quantity by a signed delta. A delta that would take
    /// the quantity below zero is rejected, not clamped: the update is a
    /// single conditional statement and zero affected rows distinguishes
    /// underflow from a missing part.
    #[instrument(skip(self), fields(part_id = %part_id, delta = delta))]
    pub async fn adjust_quantity(
        &self,
        part_id: Uuid,
        delta: i32,
        reason: MovementType,
    ) -> Result<Part, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_quantity"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let part = sqlx::query_as::<_, Part>(&format!(
            r#"
            UPDATE parts
            SET quantity = quantity + $2, updated_utc = NOW()
            WHERE part_id = $1 AND quantity + $2 >= 0
            RETURNING {PART_COLUMNS}
            "#
        ))
        .bind(part_id)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to adjust quantity: {}", e))
        })?;

        let part = match part {
            Some(part) => part,
            None => {
                let on_hand: Option<i32> =
                    sqlx::query_scalar("SELECT quantity FROM parts WHERE part_id = $1")
                        .bind(part_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(|e| {
                            AppError::DatabaseError(anyhow::anyhow!("Failed to read part: {}", e))
                        })?;
                return match on_hand {
                    Some(quantity) => Err(AppError::InsufficientStock(anyhow::anyhow!(
                        "Adjustment of {} would underflow stock of {} (available {})",
                        delta,
                        part_id,
                        quantity
                    ))),
                    None => Err(AppError::NotFound(anyhow::anyhow!("Part not found"))),
                };
            }
        };

        append_movement(
            &mut tx,
            &RecordMovement {
                movement_type: reason,
                part_id: Some(part.part_id),
                invoice_id: None,
                quantity_before: Some(part.quantity - delta),
                quantity_after: Some(part.quantity),
                quantity_delta: Some(delta),
                amount: None,
            },
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to commit adjustment: {}", e))
        })?;

        self.trim_movements().await;

        timer.observe_duration();

        STOCK_MOVEMENTS_TOTAL
            .with_label_values(&[reason.as_str()])
            .inc();

        info!(part_id = %part.part_id, quantity = part.quantity, "Part quantity adjusted");

        Ok(part)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice as one atomic unit: reservation pre-check, invoice
    /// insert, line-item inserts, per-line inventory decrement and audit
    /// entries all commit together or not at all.
    #[instrument(skip(self, input), fields(customer = %input.customer_name, lines = input.lines.len()))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Reservation pass 1: every line must be satisfiable before any row
        // is touched. Dropping the transaction on an early return rolls back.
        let mut priced: Vec<PricedLine> = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let row = sqlx::query_as::<_, (String, i32, Decimal, Decimal)>(
                "SELECT part_name, quantity, cost, discount FROM parts WHERE part_id = $1",
            )
            .bind(line.part_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read part: {}", e)))?;

            let (part_name, on_hand, cost, discount) = match row {
                Some(row) => row,
                None => {
                    return Err(AppError::NotFound(anyhow::anyhow!(
                        "Part {} not found",
                        line.part_id
                    )))
                }
            };

            if on_hand < line.quantity {
                return Err(AppError::InsufficientStock(anyhow::anyhow!(
                    "Insufficient stock for {}: available {}, requested {}",
                    part_name,
                    on_hand,
                    line.quantity
                )));
            }

            // Default snapshot price: current cost less the part's discount.
            let unit_price = line.unit_price.unwrap_or_else(|| {
                let factor = (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED;
                (cost * factor).round_dp(2)
            });
            let line_total = (unit_price * Decimal::from(line.quantity)).round_dp(2);
            priced.push(PricedLine {
                part_id: line.part_id,
                part_name,
                quantity: line.quantity,
                unit_price,
                line_total,
            });
        }

        let subtotal: Decimal = priced.iter().map(|l| l.line_total).sum();
        let tax_amount = (subtotal * input.tax_rate / Decimal::ONE_HUNDRED).round_dp(2);
        let grand_total = subtotal + tax_amount;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, customer_name, customer_email, customer_phone,
                subtotal, tax_rate, tax_amount, grand_total, payment_method, notes, status,
                created_by
            )
            VALUES ($1, next_invoice_number(), $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(&input.customer_name)
        .bind(&input.customer_email)
        .bind(&input.customer_phone)
        .bind(subtotal)
        .bind(input.tax_rate)
        .bind(tax_amount)
        .bind(grand_total)
        .bind(&input.payment_method)
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        // Reservation pass 2: conditional decrements. The quantity re-check
        // closes the race against a concurrent creator that committed between
        // our pre-check and this statement.
        let mut items = Vec::with_capacity(priced.len());
        for line in &priced {
            let after: Option<i32> = sqlx::query_scalar(
                r#"
                UPDATE parts
                SET quantity = quantity - $2, updated_utc = NOW()
                WHERE part_id = $1 AND quantity >= $2
                RETURNING quantity
                "#,
            )
            .bind(line.part_id)
            .bind(line.quantity)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to decrement stock: {}", e))
            })?;

            let after = match after {
                Some(after) => after,
                None => {
                    return Err(AppError::InsufficientStock(anyhow::anyhow!(
                        "Insufficient stock for {}: reservation lost to a concurrent sale",
                        line.part_name
                    )))
                }
            };

            let item = sqlx::query_as::<_, LineItem>(&format!(
                r#"
                INSERT INTO invoice_line_items (
                    line_item_id, invoice_id, part_id, quantity, unit_price, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {LINE_ITEM_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(line.part_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;

            append_movement(
                &mut tx,
                &RecordMovement {
                    movement_type: MovementType::Sell,
                    part_id: Some(line.part_id),
                    invoice_id: Some(invoice_id),
                    quantity_before: Some(after + line.quantity),
                    quantity_after: Some(after),
                    quantity_delta: Some(-line.quantity),
                    amount: Some(line.line_total),
                },
            )
            .await?;

            items.push(item);
        }

        tx.commit().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        self.trim_movements().await;

        timer.observe_duration();

        INVOICES_TOTAL.with_label_values(&["pending"]).inc();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            grand_total = %invoice.grand_total,
            "Invoice created"
        );

        Ok(InvoiceWithItems { invoice, items })
    }

    /// Get an invoice with its line items.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<InvoiceWithItems>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let invoice = match invoice {
            Some(invoice) => invoice,
            None => {
                timer.observe_duration();
                return Ok(None);
            }
        };

        let items = sqlx::query_as::<_, LineItem>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM invoice_line_items WHERE invoice_id = $1 ORDER BY created_utc"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    /// List all invoices, newest first.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY created_utc DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Overwrite an invoice's status. Manual override path: no inventory side
    /// effect and no validation against the paid amount.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, status = %status))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $2, updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, status = %inv.status, "Invoice status overridden");
        }

        Ok(invoice)
    }

    /// Delete an invoice and restore the stock it reserved, atomically.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT invoice_id FROM invoices WHERE invoice_id = $1")
                .bind(invoice_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to read invoice: {}", e))
                })?;

        if exists.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
        }

        let items = sqlx::query_as::<_, LineItem>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM invoice_line_items WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        for item in &items {
            let after: i32 = sqlx::query_scalar(
                r#"
                UPDATE parts
                SET quantity = quantity + $2, updated_utc = NOW()
                WHERE part_id = $1
                RETURNING quantity
                "#,
            )
            .bind(item.part_id)
            .bind(item.quantity)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to restore stock: {}", e))
            })?;

            append_movement(
                &mut tx,
                &RecordMovement {
                    movement_type: MovementType::Buy,
                    part_id: Some(item.part_id),
                    invoice_id: Some(invoice_id),
                    quantity_before: Some(after - item.quantity),
                    quantity_after: Some(after),
                    quantity_delta: Some(item.quantity),
                    amount: Some(item.line_total),
                },
            )
            .await?;
        }

        sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete line items: {}", e))
            })?;

        sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to commit deletion: {}", e))
        })?;

        self.trim_movements().await;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, restored_lines = items.len(), "Invoice deleted, stock restored");

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment. When the payment references an invoice that still
    /// exists, the invoice's paid amount is recomputed from the full payment
    /// set and its status re-derived; a missing invoice is tolerated and the
    /// payment is recorded regardless.
    #[instrument(skip(self, input), fields(payer = %input.payer_name, amount = %input.amount))]
    pub async fn record_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let payment_id = Uuid::new_v4();
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                payment_id, invoice_id, invoice_number, payer_name, amount, payment_method,
                reference, notes, status, recorded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'confirmed', $9)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(input.invoice_id)
        .bind(&input.invoice_number)
        .bind(&input.payer_name)
        .bind(input.amount)
        .bind(input.payment_method.as_str())
        .bind(&input.reference)
        .bind(&input.notes)
        .bind(input.recorded_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        append_movement(
            &mut tx,
            &RecordMovement {
                movement_type: MovementType::Payment,
                part_id: None,
                invoice_id: input.invoice_id,
                quantity_before: None,
                quantity_after: None,
                quantity_delta: None,
                amount: Some(input.amount),
            },
        )
        .await?;

        if let Some(invoice_id) = input.invoice_id {
            let invoice = sqlx::query_as::<_, Invoice>(&format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1"
            ))
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to read invoice: {}", e))
            })?;

            match invoice {
                Some(invoice) => {
                    // Recompute from the payment set rather than trusting a
                    // running counter; stays correct under out-of-band edits.
                    let paid_amount: Decimal = sqlx::query_scalar(
                        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
                    )
                    .bind(invoice_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to sum invoice payments: {}",
                            e
                        ))
                    })?;

                    let status = InvoiceStatus::derive(paid_amount, invoice.grand_total);
                    sqlx::query(
                        r#"
                        UPDATE invoices
                        SET paid_amount = $2, status = $3, updated_utc = NOW()
                        WHERE invoice_id = $1
                        "#,
                    )
                    .bind(invoice_id)
                    .bind(paid_amount)
                    .bind(status.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to update invoice payment status: {}",
                            e
                        ))
                    })?;

                    INVOICES_TOTAL.with_label_values(&[status.as_str()]).inc();
                }
                None => {
                    warn!(
                        invoice_id = %invoice_id,
                        "Payment references a missing invoice; recording payment anyway"
                    );
                }
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::TransactionFailure(anyhow::anyhow!("Failed to commit payment: {}", e))
        })?;

        self.trim_movements().await;

        timer.observe_duration();

        PAYMENTS_TOTAL
            .with_label_values(&[input.payment_method.as_str()])
            .inc();

        info!(payment_id = %payment.payment_id, amount = %payment.amount, "Payment recorded");

        Ok(payment)
    }

    /// List all payments, newest first.
    #[instrument(skip(self))]
    pub async fn list_payments(&self) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_utc DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// List payments recorded against one invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payments_for_invoice"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = $1 ORDER BY created_utc DESC"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list invoice payments: {}", e))
        })?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Delete a payment.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn delete_payment(&self, payment_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        let result = sqlx::query("DELETE FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(payment_id = %payment_id, "Payment deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Reporting Operations
    // -------------------------------------------------------------------------

    /// Daily sales summary, optionally bounded by a date range.
    #[instrument(skip(self))]
    pub async fn sales_summary(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<SalesSummaryRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sales_summary"])
            .start_timer();

        let rows = sqlx::query_as::<_, SalesSummaryRow>(
            r#"
            SELECT created_utc::date AS date,
                   COUNT(*) AS invoice_count,
                   COALESCE(SUM(grand_total), 0) AS total_revenue,
                   COALESCE(AVG(grand_total), 0) AS average_invoice,
                   COUNT(CASE WHEN status = 'paid' THEN 1 END) AS paid_invoices
            FROM invoices
            WHERE ($1::date IS NULL OR created_utc::date >= $1)
              AND ($2::date IS NULL OR created_utc::date <= $2)
            GROUP BY created_utc::date
            ORDER BY created_utc::date DESC
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to build sales summary: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Stock position per category.
    #[instrument(skip(self))]
    pub async fn inventory_summary(&self) -> Result<Vec<InventorySummaryRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["inventory_summary"])
            .start_timer();

        let rows = sqlx::query_as::<_, InventorySummaryRow>(
            r#"
            SELECT category,
                   COUNT(*) AS total_parts,
                   COALESCE(SUM(quantity), 0)::bigint AS total_quantity,
                   COALESCE(SUM(quantity * cost), 0) AS total_value,
                   COUNT(CASE WHEN quantity <= min_stock_level THEN 1 END) AS low_stock_items
            FROM parts
            GROUP BY category
            ORDER BY total_value DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to build inventory summary: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Payment volume per method.
    #[instrument(skip(self))]
    pub async fn payment_method_summary(&self) -> Result<Vec<PaymentMethodSummaryRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payment_method_summary"])
            .start_timer();

        let rows = sqlx::query_as::<_, PaymentMethodSummaryRow>(
            r#"
            SELECT payment_method,
                   COUNT(*) AS total_payments,
                   COALESCE(SUM(amount), 0) AS total_amount,
                   COALESCE(AVG(amount), 0) AS average_amount
            FROM payments
            GROUP BY payment_method
            ORDER BY total_amount DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to build payment summary: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Customers, derived from the invoices they appear on.
    #[instrument(skip(self))]
    pub async fn list_customers(&self) -> Result<Vec<CustomerSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let rows = sqlx::query_as::<_, CustomerSummary>(
            r#"
            SELECT DISTINCT customer_name, customer_email, customer_phone
            FROM invoices
            ORDER BY customer_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Purchase history for one customer.
    #[instrument(skip(self))]
    pub async fn customer_history(
        &self,
        customer_name: &str,
    ) -> Result<Vec<CustomerHistoryRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["customer_history"])
            .start_timer();

        let rows = sqlx::query_as::<_, CustomerHistoryRow>(
            r#"
            SELECT i.invoice_id, i.invoice_number, i.status, i.grand_total, i.paid_amount,
                   i.created_utc,
                   COUNT(li.line_item_id) AS item_count,
                   COALESCE(SUM(li.quantity), 0)::bigint AS total_items
            FROM invoices i
            LEFT JOIN invoice_line_items li ON i.invoice_id = li.invoice_id
            WHERE i.customer_name = $1
            GROUP BY i.invoice_id
            ORDER BY i.created_utc DESC
            "#,
        )
        .bind(customer_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get customer history: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Aggregate statistics for one customer. `None` when the customer has no
    /// invoices.
    #[instrument(skip(self))]
    pub async fn customer_statistics(
        &self,
        customer_name: &str,
    ) -> Result<Option<CustomerStatistics>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["customer_statistics"])
            .start_timer();

        let row = sqlx::query_as::<_, CustomerStatistics>(
            r#"
            SELECT customer_name,
                   COUNT(*) AS total_invoices,
                   COALESCE(SUM(grand_total), 0) AS total_spent,
                   COALESCE(AVG(grand_total), 0) AS average_invoice,
                   MAX(created_utc) AS last_purchase
            FROM invoices
            WHERE customer_name = $1
            GROUP BY customer_name
            "#,
        )
        .bind(customer_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get customer statistics: {}", e))
        })?;

        timer.observe_duration();

        Ok(row)
    }

    /// Recent audit entries, newest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StockMovement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_movements"])
            .start_timer();

        let rows = sqlx::query_as::<_, StockMovement>(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS} FROM stock_movements
            ORDER BY created_utc DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit.clamp(1, MOVEMENT_LOG_CAPACITY))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list movements: {}", e)))?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Drop audit entries beyond the newest 1000. Best-effort: a trim failure
    /// never fails the operation that triggered it.
    async fn trim_movements(&self) {
        let result = sqlx::query(
            r#"
            DELETE FROM stock_movements
            WHERE movement_id IN (
                SELECT movement_id FROM stock_movements
                ORDER BY created_utc DESC, movement_id
                OFFSET $1
            )
            "#,
        )
        .bind(MOVEMENT_LOG_CAPACITY)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(error = %e, "Failed to trim stock movement log");
        }
    }
}

/// Insert one audit entry within the caller's transaction so the entry
/// commits or rolls back together with the operation it records.
async fn append_movement(
    tx: &mut Transaction<'_, Postgres>,
    input: &RecordMovement,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            movement_id, movement_type, part_id, invoice_id,
            quantity_before, quantity_after, quantity_delta, amount
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(input.movement_type.as_str())
    .bind(input.part_id)
    .bind(input.invoice_id)
    .bind(input.quantity_before)
    .bind(input.quantity_after)
    .bind(input.quantity_delta)
    .bind(input.amount)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to append audit entry: {}", e)))?;

    Ok(())
}
