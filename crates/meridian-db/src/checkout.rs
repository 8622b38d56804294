//! # Checkout: The Sale Transaction Processor
//!
//! Turns a validated cart into exactly one durable sale, or into a typed
//! error and no state change at all.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CHECKOUT PIPELINE                                  │
//! │                                                                         │
//! │  validate (pure)  →  price (pure)                                      │
//! │       │                                                                 │
//! │       ▼   BEGIN ──────────────────────────────────────────────┐        │
//! │  resolve products          → NotFound                         │        │
//! │  availability read         → InsufficientStock                │        │
//! │  verify payment / change   → InvalidPayment                   │        │
//! │  reserve invoice number    (per-day counter upsert)           │        │
//! │  insert sale header                                           │        │
//! │  per line:                                                    │        │
//! │    conditional stock decrement → InsufficientStock            │        │
//! │    insert sale item                                           │        │
//! │    FEFO lot allocation                                        │        │
//! │  COMMIT ──────────────────────────────────────────────────────┘        │
//! │                                                                         │
//! │  Any failure inside the region rolls the whole sale back:              │
//! │  no partial sale rows, no partial decrements, no burned counter.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The availability read fixes error precedence only (a cart that is both
//! short-stocked and underpaid reports the stock problem); the decrement
//! further down stays the source of truth under concurrency.
//!
//! ## Invoice Collision Retry
//! The `UNIQUE(invoice_number)` constraint is the backstop behind the
//! sequencer. A collision means a sale holds a number the counter never
//! issued, so before rerunning, the service resyncs the counter past
//! everything already in `sales` for the day and then retries with the
//! following number, a bounded number of times; exhaustion surfaces as
//! [`CheckoutError::ServiceUnavailable`] so the register can tell the
//! cashier to retry rather than silently double-charging.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::invoice::InvoiceSequencer;
use crate::repository::product::get_on;
use crate::repository::sale::{insert_item_on, insert_sale_on};
use crate::repository::stock::{allocate_fefo_on, deduct_on, StockDeduction};
use meridian_core::validation::validate_checkout;
use meridian_core::{
    price_cart, CartTotals, CheckoutRequest, Money, Sale, SaleItem, SaleStatus, SaleWithItems,
    ValidationError,
};

// =============================================================================
// Configuration
// =============================================================================

/// Checkout service configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Invoice number prefix, e.g. `"INV"`.
    pub invoice_prefix: String,

    /// Offset from UTC, in minutes, defining the store's business day.
    /// Both the counter scope and the invoice's date segment derive from
    /// this one basis.
    pub utc_offset_minutes: i32,

    /// Maximum attempts when an invoice number collides.
    /// Default: 3
    pub max_invoice_attempts: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            invoice_prefix: "INV".to_string(),
            utc_offset_minutes: 0,
            max_invoice_attempts: 3,
        }
    }
}

impl CheckoutConfig {
    /// Sets the invoice prefix.
    pub fn invoice_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.invoice_prefix = prefix.into();
        self
    }

    /// Sets the store's UTC offset in minutes.
    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// The store-local calendar date for a given instant.
    fn business_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::minutes(self.utc_offset_minutes as i64)).date_naive()
    }
}

// =============================================================================
// Error Taxonomy
// =============================================================================

/// Checkout failures, one variant per caller-visible outcome.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A requested product does not exist.
    #[error("Product not found: {product_id}")]
    NotFound { product_id: String },

    /// A product holds fewer units than the cart requested. `available`
    /// is the level observed inside the failed transaction.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// The tendered amount does not cover the computed total.
    #[error("Payment {paid_cents} does not cover total {total_cents}")]
    InvalidPayment {
        total_cents: Money,
        paid_cents: Money,
    },

    /// The request failed business-rule validation before any storage
    /// access.
    #[error("Invalid checkout request: {0}")]
    Validation(#[from] ValidationError),

    /// Invoice number collisions exhausted the retry budget.
    #[error("Checkout temporarily unavailable after {attempts} attempts")]
    ServiceUnavailable { attempts: u32 },

    /// Underlying storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

// =============================================================================
// Checkout Service
// =============================================================================

/// The sale transaction processor.
///
/// Cloning is cheap; clones share the pool and may run concurrently. All
/// correctness under concurrency comes from the SQL shapes (conditional
/// decrement, counter upsert, UNIQUE backstop), not from any lock here.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    sequencer: InvoiceSequencer,
    config: CheckoutConfig,
}

impl CheckoutService {
    /// Creates a checkout service over the given pool.
    pub fn new(pool: SqlitePool, config: CheckoutConfig) -> Self {
        let sequencer = InvoiceSequencer::new(config.invoice_prefix.clone());
        CheckoutService {
            pool,
            sequencer,
            config,
        }
    }

    /// Processes a cart into a durable sale.
    ///
    /// On success the sale, its items and all stock effects are
    /// committed; on any error nothing is.
    pub async fn process(&self, request: CheckoutRequest) -> Result<SaleWithItems, CheckoutError> {
        validate_checkout(&request)?;
        let totals = price_cart(&request)?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.try_commit(&request, &totals).await {
                Ok(sale) => {
                    info!(
                        invoice_number = %sale.sale.invoice_number,
                        total_cents = sale.sale.total_cents.cents(),
                        items = sale.items.len(),
                        "Sale committed"
                    );
                    return Ok(sale);
                }

                Err(CheckoutError::Db(err))
                    if err.is_unique_violation_on("invoice_number")
                        && attempt < self.config.max_invoice_attempts =>
                {
                    warn!(attempt, "Invoice number collision, retrying checkout");

                    // The failed transaction rolled the counter bump back,
                    // so a bare retry would regenerate the same number.
                    // Advance the counter past the occupant on a committed
                    // connection before rerunning.
                    let day = self.config.business_date(Utc::now());
                    let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
                    self.sequencer.resync(&mut conn, day).await?;
                    continue;
                }

                Err(CheckoutError::Db(err)) if err.is_unique_violation_on("invoice_number") => {
                    warn!(attempts = attempt, "Invoice retry budget exhausted");
                    return Err(CheckoutError::ServiceUnavailable { attempts: attempt });
                }

                Err(other) => return Err(other),
            }
        }
    }

    /// One transactional attempt. A `Db(UniqueViolation)` on
    /// `invoice_number` is retriable; everything else is final.
    async fn try_commit(
        &self,
        request: &CheckoutRequest,
        totals: &CartTotals,
    ) -> Result<SaleWithItems, CheckoutError> {
        let now = Utc::now();
        let day = self.config.business_date(now);

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Resolve products and read availability up front: an unknown or
        // short-stocked line outranks a payment problem, and neither
        // should touch the counter. The read is precedence only - the
        // conditional decrement below remains the gatekeeper.
        let mut snapshots = Vec::with_capacity(totals.lines.len());
        for line in &totals.lines {
            let product = get_on(&mut tx, &line.product_id)
                .await?
                .ok_or_else(|| CheckoutError::NotFound {
                    product_id: line.product_id.clone(),
                })?;

            if product.total_stock < line.quantity {
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available: product.total_stock,
                });
            }

            snapshots.push(product);
        }

        let change = totals
            .change_for(request.amount_paid)
            .map_err(|shortfall| CheckoutError::InvalidPayment {
                total_cents: shortfall.total,
                paid_cents: shortfall.paid,
            })?;

        let invoice_number = self.sequencer.next(&mut tx, day).await?;

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            invoice_number,
            status: SaleStatus::Completed,
            subtotal_cents: totals.subtotal,
            discount_cents: totals.discount,
            tax_cents: totals.tax,
            total_cents: totals.total,
            amount_paid_cents: request.amount_paid,
            change_cents: change,
            payment_method: request.payment_method,
            cashier_id: request.cashier_id.clone(),
            customer_name: request.customer_name.clone(),
            customer_phone: request.customer_phone.clone(),
            notes: request.notes.clone(),
            created_at: now,
        };

        insert_sale_on(&mut tx, &sale).await?;

        let mut items = Vec::with_capacity(totals.lines.len());
        for (line, product) in totals.lines.iter().zip(&snapshots) {
            match deduct_on(&mut tx, &line.product_id, line.quantity, now).await? {
                StockDeduction::Applied => {}
                StockDeduction::Insufficient { available } => {
                    // Dropping the transaction rolls everything back,
                    // the reserved invoice number included.
                    return Err(CheckoutError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        requested: line.quantity,
                        available,
                    });
                }
            }

            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price,
                discount_cents: line.discount,
                total_cents: line.total,
                created_at: now,
            };

            insert_item_on(&mut tx, &item).await?;
            allocate_fefo_on(&mut tx, &item, now).await?;
            items.push(item);
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(SaleWithItems { sale, items })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::batch::NewBatch;
    use crate::repository::product::NewProduct;
    use meridian_core::{LineRequest, LotAllocation, PaymentMethod};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seeded_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> String {
        db.products()
            .insert(NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                description: None,
                cost_cents: Money::from_cents(price_cents / 2 + 1),
                price_cents: Money::from_cents(price_cents),
                total_stock: stock,
                low_stock_threshold: 5,
                reorder_level: 10,
                category_id: None,
                supplier_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn line(product_id: &str, qty: i64, unit_cents: i64) -> LineRequest {
        LineRequest {
            product_id: product_id.to_string(),
            quantity: qty,
            unit_price: Money::from_cents(unit_cents),
            discount: Money::zero(),
        }
    }

    fn request(lines: Vec<LineRequest>, paid_cents: i64) -> CheckoutRequest {
        CheckoutRequest {
            lines,
            discount: Money::zero(),
            tax: Money::zero(),
            amount_paid: Money::from_cents(paid_cents),
            payment_method: PaymentMethod::Cash,
            cashier_id: "cashier-1".to_string(),
            customer_name: None,
            customer_phone: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_successful_sale_commits_everything() {
        let db = test_db().await;
        let a = seeded_product(&db, "A", 800, 10).await;
        let b = seeded_product(&db, "B", 350, 10).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let sale = checkout
            .process(request(vec![line(&a, 2, 800), line(&b, 1, 350)], 1950))
            .await
            .unwrap();

        assert_eq!(sale.sale.subtotal_cents.cents(), 1950);
        assert_eq!(sale.sale.total_cents.cents(), 1950);
        assert_eq!(sale.sale.change_cents.cents(), 0);
        assert_eq!(sale.sale.status, SaleStatus::Completed);
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.items[0].sku_snapshot, "A");

        // Format: PREFIX-YYYYMMDD-SEQ, first sale of the day.
        assert!(sale.sale.invoice_number.starts_with("INV-"));
        assert!(sale.sale.invoice_number.ends_with("-0001"));

        let pa = db.products().get_by_id(&a).await.unwrap().unwrap();
        let pb = db.products().get_by_id(&b).await.unwrap().unwrap();
        assert_eq!(pa.total_stock, 8);
        assert_eq!(pb.total_stock, 9);

        // Durable and readable back through the sale repository.
        let stored = db.sales().get_with_items(&sale.sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items.len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_whole_sale() {
        let db = test_db().await;
        let plenty = seeded_product(&db, "PLENTY", 500, 100).await;
        let scarce = seeded_product(&db, "SCARCE", 500, 3).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let err = checkout
            .process(request(vec![line(&plenty, 5, 500), line(&scarce, 5, 500)], 5000))
            .await
            .unwrap_err();

        match err {
            CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, scarce);
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // The first line's decrement must have rolled back too.
        let p = db.products().get_by_id(&plenty).await.unwrap().unwrap();
        assert_eq!(p.total_stock, 100);

        let sales = db
            .sales()
            .list(
                NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2100, 1, 1).unwrap(),
                10,
                0,
            )
            .await
            .unwrap();
        assert!(sales.is_empty());
    }

    #[tokio::test]
    async fn test_underpayment_touches_nothing() {
        let db = test_db().await;
        let a = seeded_product(&db, "A", 1000, 10).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let err = checkout
            .process(request(vec![line(&a, 2, 1000)], 1500))
            .await
            .unwrap_err();

        match err {
            CheckoutError::InvalidPayment {
                total_cents,
                paid_cents,
            } => {
                assert_eq!(total_cents.cents(), 2000);
                assert_eq!(paid_cents.cents(), 1500);
            }
            other => panic!("expected InvalidPayment, got {other:?}"),
        }

        let p = db.products().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(p.total_stock, 10);
    }

    #[tokio::test]
    async fn test_change_is_computed_and_stored() {
        let db = test_db().await;
        let a = seeded_product(&db, "A", 1000, 10).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let mut req = request(vec![line(&a, 2, 1000)], 2000);
        req.discount = Money::from_cents(200);
        req.tax = Money::from_cents(100);

        let sale = checkout.process(req).await.unwrap();
        assert_eq!(sale.sale.total_cents.cents(), 1900);
        assert_eq!(sale.sale.change_cents.cents(), 100);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = test_db().await;
        let checkout = db.checkout(CheckoutConfig::default());

        let err = checkout
            .process(request(vec![line("ghost-id", 1, 500)], 500))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::NotFound { product_id } if product_id == "ghost-id"));
    }

    #[tokio::test]
    async fn test_empty_cart_is_a_validation_error() {
        let db = test_db().await;
        let checkout = db.checkout(CheckoutConfig::default());

        let err = checkout.process(request(vec![], 0)).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::EmptyCart)
        ));
    }

    /// A sale already holds today's next number (restored backup, manual
    /// insert). The collision retry must resync the counter and come
    /// back with the following number instead of exhausting its budget.
    #[tokio::test]
    async fn test_checkout_recovers_from_occupied_invoice_number() {
        let db = test_db().await;
        let a = seeded_product(&db, "A", 500, 10).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let day_key = Utc::now().date_naive().format("%Y%m%d").to_string();
        let occupied = format!("INV-{day_key}-0001");
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, subtotal_cents, total_cents,
                amount_paid_cents, cashier_id, created_at
            ) VALUES ('external-1', ?1, 0, 0, 0, 'external', ?2)
            "#,
        )
        .bind(&occupied)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        let sale = checkout
            .process(request(vec![line(&a, 1, 500)], 500))
            .await
            .unwrap();

        assert_eq!(sale.sale.invoice_number, format!("INV-{day_key}-0002"));

        let p = db.products().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(p.total_stock, 9);
    }

    /// A cart that is both short-stocked and underpaid reports the stock
    /// problem; the payment check runs after products are resolved.
    #[tokio::test]
    async fn test_stock_error_outranks_payment_error() {
        let db = test_db().await;
        let scarce = seeded_product(&db, "SCARCE", 500, 2).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let err = checkout
            .process(request(vec![line(&scarce, 5, 500)], 100))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                requested: 5,
                available: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_product_outranks_payment_error() {
        let db = test_db().await;
        let checkout = db.checkout(CheckoutConfig::default());

        let err = checkout
            .process(request(vec![line("ghost-id", 1, 500)], 100))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invoice_numbers_are_distinct_and_increasing() {
        let db = test_db().await;
        let a = seeded_product(&db, "A", 500, 100).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let sale = checkout
                .process(request(vec![line(&a, 1, 500)], 500))
                .await
                .unwrap();
            numbers.push(sale.sale.invoice_number);
        }

        assert!(numbers[0] < numbers[1] && numbers[1] < numbers[2]);
        assert!(numbers[0].ends_with("-0001"));
        assert!(numbers[2].ends_with("-0003"));
    }

    /// Two concurrent checkouts compete for the last unit: exactly one
    /// wins, the other sees InsufficientStock, stock ends at zero.
    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let db = test_db().await;
        let a = seeded_product(&db, "LAST-ONE", 500, 1).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let (first, second) = tokio::join!(
            checkout.process(request(vec![line(&a, 1, 500)], 500)),
            checkout.process(request(vec![line(&a, 1, 500)], 500)),
        );

        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(
            loser.unwrap_err(),
            CheckoutError::InsufficientStock { available: 0, .. }
        ));

        let p = db.products().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(p.total_stock, 0);
    }

    #[tokio::test]
    async fn test_fefo_consumes_earliest_lot_first_and_splits() {
        let db = test_db().await;
        let a = seeded_product(&db, "LOTTED", 500, 0).await;
        let ledger = db.stock();

        let lot = |number: &str, qty: i64, y: i32, m: u32, d: u32| NewBatch {
            product_id: a.clone(),
            batch_number: number.to_string(),
            quantity: qty,
            expiry_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            cost_cents: Money::from_cents(250),
        };

        let early = ledger.receive_batch(lot("EARLY", 3, 2026, 10, 1)).await.unwrap();
        let late = ledger.receive_batch(lot("LATE", 10, 2027, 10, 1)).await.unwrap();
        let poisoned = ledger.receive_batch(lot("QUAR", 5, 2026, 9, 1)).await.unwrap();
        ledger.set_quarantine(&poisoned.id, true).await.unwrap();

        let checkout = db.checkout(CheckoutConfig::default());
        let sale = checkout
            .process(request(vec![line(&a, 5, 500)], 2500))
            .await
            .unwrap();

        let allocations = sqlx::query_as::<_, LotAllocation>(
            "SELECT id, sale_item_id, batch_id, quantity FROM sale_item_lots WHERE sale_item_id = ?1 ORDER BY rowid",
        )
        .bind(&sale.items[0].id)
        .fetch_all(db.pool())
        .await
        .unwrap();

        // Quarantined lot skipped even though it expires soonest; the
        // earliest eligible lot drains fully, the rest splits onto LATE.
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].batch_id, early.id);
        assert_eq!(allocations[0].quantity, 3);
        assert_eq!(allocations[1].batch_id, late.id);
        assert_eq!(allocations[1].quantity, 2);

        let early_row = db.batches().get_by_id(&early.id).await.unwrap().unwrap();
        let late_row = db.batches().get_by_id(&late.id).await.unwrap().unwrap();
        let quar_row = db.batches().get_by_id(&poisoned.id).await.unwrap().unwrap();
        assert_eq!(early_row.quantity, 0);
        assert_eq!(late_row.quantity, 8);
        assert_eq!(quar_row.quantity, 5);
    }

    #[tokio::test]
    async fn test_non_lotted_product_sells_on_aggregate_alone() {
        let db = test_db().await;
        let a = seeded_product(&db, "BULK", 500, 20).await;
        let checkout = db.checkout(CheckoutConfig::default());

        let sale = checkout
            .process(request(vec![line(&a, 4, 500)], 2000))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sale_item_lots WHERE sale_item_id = ?1",
        )
        .bind(&sale.items[0].id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 0);

        let p = db.products().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(p.total_stock, 16);
    }
}
