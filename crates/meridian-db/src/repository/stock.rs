//! # Stock Ledger
//!
//! The ONLY writers of `products.total_stock`. Every mutation is a
//! conditional SQL update so the non-negativity invariant holds under
//! concurrency without application-level locking:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WHY READ-THEN-WRITE LOSES                                              │
//! │                                                                         │
//! │  A: SELECT total_stock → 1        B: SELECT total_stock → 1            │
//! │  A: UPDATE ... SET total_stock=0  B: UPDATE ... SET total_stock=0      │
//! │  Both "succeed"; one unit was sold twice.                              │
//! │                                                                         │
//! │  OUR DESIGN: the check and the write are one statement                 │
//! │  UPDATE products SET total_stock = total_stock - ?qty                  │
//! │  WHERE id = ?id AND total_stock >= ?qty                                │
//! │  rows_affected = 0  →  insufficient (or unknown product)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lot-level (FEFO) allocation is best-effort traceability layered on top
//! of the aggregate guard: the aggregate decrement decides whether the
//! sale happens, the lot walk records where the units came from.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::batch::{insert_row_on, NewBatch};
use meridian_core::{AdjustmentType, ProductBatch, SaleItem};

// =============================================================================
// Deduction Outcome
// =============================================================================

/// Result of a conditional stock deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDeduction {
    /// Stock was decremented by the requested quantity.
    Applied,
    /// The product exists but holds fewer units than requested.
    Insufficient { available: i64 },
}

// =============================================================================
// Transaction-Scoped Operations
// =============================================================================

/// Conditionally deducts `quantity` units from a product's aggregate
/// stock on the given connection.
///
/// ## Returns
/// * `Ok(StockDeduction::Applied)` - decrement happened
/// * `Ok(StockDeduction::Insufficient)` - not enough units; nothing changed
/// * `Err(DbError::NotFound)` - no such product
pub(crate) async fn deduct_on(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<StockDeduction> {
    if quantity <= 0 {
        return Err(DbError::invalid_argument(format!(
            "deduction quantity must be positive, got {quantity}"
        )));
    }

    let result = sqlx::query(
        r#"
        UPDATE products
        SET total_stock = total_stock - ?1, updated_at = ?2
        WHERE id = ?3 AND total_stock >= ?1
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(StockDeduction::Applied);
    }

    // Zero rows: either the product is missing or it is short. Re-select
    // to tell the two apart; still inside the caller's transaction.
    let available: Option<i64> =
        sqlx::query_scalar("SELECT total_stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    match available {
        Some(available) => Ok(StockDeduction::Insufficient { available }),
        None => Err(DbError::not_found("Product", product_id)),
    }
}

/// Walks a sale item's lots first-expiring-first-out, decrementing lot
/// quantities and recording `sale_item_lots` rows.
///
/// Non-lotted products (no batch rows) are covered by the aggregate
/// guard alone; that is not an error. If lots exist but hold fewer units
/// than the aggregate said was available, the shortfall is logged and
/// the sale proceeds - lot records are traceability, not the gatekeeper.
pub(crate) async fn allocate_fefo_on(
    conn: &mut SqliteConnection,
    item: &SaleItem,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let lots = sqlx::query_as::<_, ProductBatch>(
        r#"
        SELECT id, product_id, batch_number,
               quantity, expiry_date, is_quarantined, cost_cents,
               created_at, updated_at
        FROM product_batches
        WHERE product_id = ?1 AND quantity > 0 AND is_quarantined = 0
        ORDER BY expiry_date ASC, created_at ASC
        "#,
    )
    .bind(&item.product_id)
    .fetch_all(&mut *conn)
    .await?;

    if lots.is_empty() {
        return Ok(());
    }

    let mut remaining = item.quantity;
    for lot in &lots {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(lot.quantity);

        let result = sqlx::query(
            r#"
            UPDATE product_batches
            SET quantity = quantity - ?1, updated_at = ?2
            WHERE id = ?3 AND quantity >= ?1
            "#,
        )
        .bind(take)
        .bind(now)
        .bind(&lot.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO sale_item_lots (id, sale_item_id, batch_id, quantity)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.id)
        .bind(&lot.id)
        .bind(take)
        .execute(&mut *conn)
        .await?;

        remaining -= take;
    }

    if remaining > 0 {
        // Aggregate and lot totals have drifted (manual adjustment on the
        // aggregate without lot receipt, usually). The sale already passed
        // the aggregate guard, so record the gap instead of failing it.
        warn!(
            product_id = %item.product_id,
            sale_item_id = %item.id,
            unallocated = remaining,
            "Lot quantities short of aggregate stock; allocation incomplete"
        );
    }

    Ok(())
}

async fn record_adjustment_on(
    conn: &mut SqliteConnection,
    product_id: &str,
    adjustment_type: AdjustmentType,
    quantity: i64,
    reason: Option<&str>,
    performed_by: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_adjustments (
            id, product_id, adjustment_type, quantity, reason, performed_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(adjustment_type)
    .bind(quantity)
    .bind(reason)
    .bind(performed_by)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Pool-level stock mutation surface: receipts, manual adjustments and
/// quarantine. Sale-time deductions go through the checkout transaction
/// instead.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Deducts units from a product outside a sale (sampling, transfer
    /// out). Same conditional semantics as the checkout deduction.
    pub async fn deduct(&self, product_id: &str, quantity: i64) -> DbResult<StockDeduction> {
        let mut conn = self.pool.acquire().await?;
        deduct_on(&mut conn, product_id, quantity, Utc::now()).await
    }

    /// Receives a lot into stock: inserts the batch row and raises the
    /// product aggregate in one transaction.
    pub async fn receive_batch(&self, new: NewBatch) -> DbResult<ProductBatch> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let batch = insert_row_on(&mut tx, &new).await?;

        let result = sqlx::query(
            "UPDATE products SET total_stock = total_stock + ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(new.quantity)
        .bind(now)
        .bind(&new.product_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &new.product_id));
        }

        record_adjustment_on(
            &mut tx,
            &new.product_id,
            AdjustmentType::Addition,
            new.quantity,
            Some("batch receipt"),
            None,
            now,
        )
        .await?;

        tx.commit().await?;

        debug!(
            product_id = %new.product_id,
            batch_number = %new.batch_number,
            quantity = new.quantity,
            "Batch received into stock"
        );

        Ok(batch)
    }

    /// Applies a manual adjustment (`delta` may be negative) with an
    /// audit row. Negative deltas are conditional and fail as
    /// `Insufficient` rather than driving stock below zero.
    ///
    /// Returns the new stock level.
    pub async fn adjust(
        &self,
        product_id: &str,
        delta: i64,
        adjustment_type: AdjustmentType,
        reason: Option<&str>,
        performed_by: Option<&str>,
    ) -> DbResult<i64> {
        if delta == 0 {
            return Err(DbError::invalid_argument("adjustment delta must be non-zero"));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if delta < 0 {
            match deduct_on(&mut tx, product_id, -delta, now).await? {
                StockDeduction::Applied => {}
                StockDeduction::Insufficient { available } => {
                    return Err(DbError::invalid_argument(format!(
                        "cannot remove {} units, only {available} available",
                        -delta
                    )));
                }
            }
        } else {
            let result = sqlx::query(
                "UPDATE products SET total_stock = total_stock + ?1, updated_at = ?2 WHERE id = ?3",
            )
            .bind(delta)
            .bind(now)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Product", product_id));
            }
        }

        record_adjustment_on(
            &mut tx,
            product_id,
            adjustment_type,
            delta,
            reason,
            performed_by,
            now,
        )
        .await?;

        let new_level: i64 = sqlx::query_scalar("SELECT total_stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            product_id = %product_id,
            delta,
            new_level,
            "Manual stock adjustment applied"
        );

        Ok(new_level)
    }

    /// Quarantines or releases a lot, moving its quantity out of or back
    /// into the product's sellable aggregate.
    pub async fn set_quarantine(&self, batch_id: &str, quarantined: bool) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let lot: Option<(String, i64, bool)> = sqlx::query_as(
            "SELECT product_id, quantity, is_quarantined FROM product_batches WHERE id = ?1",
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((product_id, quantity, currently)) = lot else {
            return Err(DbError::not_found("ProductBatch", batch_id));
        };

        if currently == quarantined {
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query(
            "UPDATE product_batches SET is_quarantined = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(quarantined)
        .bind(now)
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

        if quarantined {
            // The lot may already be partially sold past what the
            // aggregate reflects after drift; clamp at zero.
            sqlx::query(
                r#"
                UPDATE products
                SET total_stock = MAX(total_stock - ?1, 0), updated_at = ?2
                WHERE id = ?3
                "#,
            )
            .bind(quantity)
            .bind(now)
            .bind(&product_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE products SET total_stock = total_stock + ?1, updated_at = ?2 WHERE id = ?3",
            )
            .bind(quantity)
            .bind(now)
            .bind(&product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(batch_id = %batch_id, quarantined, "Batch quarantine flag updated");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use chrono::NaiveDate;
    use meridian_core::Money;

    async fn seeded_product(db: &Database, stock: i64) -> String {
        db.products()
            .insert(NewProduct {
                sku: "CET-10".to_string(),
                name: "Cetirizine 10mg".to_string(),
                description: None,
                cost_cents: Money::from_cents(200),
                price_cents: Money::from_cents(400),
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_deduct_applies_and_refuses() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = seeded_product(&db, 5).await;
        let ledger = db.stock();

        assert_eq!(ledger.deduct(&id, 3).await.unwrap(), StockDeduction::Applied);
        assert_eq!(
            ledger.deduct(&id, 3).await.unwrap(),
            StockDeduction::Insufficient { available: 2 }
        );

        let product = db.products().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(product.total_stock, 2);
    }

    #[tokio::test]
    async fn test_deduct_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.stock().deduct("no-such-id", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_receive_batch_raises_aggregate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = seeded_product(&db, 0).await;

        db.stock()
            .receive_batch(NewBatch {
                product_id: id.clone(),
                batch_number: "B-001".to_string(),
                quantity: 30,
                expiry_date: date(2027, 1, 1),
                cost_cents: Money::from_cents(200),
            })
            .await
            .unwrap();

        let product = db.products().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(product.total_stock, 30);
    }

    #[tokio::test]
    async fn test_negative_adjustment_is_conditional() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = seeded_product(&db, 4).await;
        let ledger = db.stock();

        let err = ledger
            .adjust(&id, -10, AdjustmentType::Damage, Some("breakage"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));

        let level = ledger
            .adjust(&id, -3, AdjustmentType::Damage, Some("breakage"), None)
            .await
            .unwrap();
        assert_eq!(level, 1);
    }

    #[tokio::test]
    async fn test_quarantine_moves_stock_out_and_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = seeded_product(&db, 0).await;
        let ledger = db.stock();

        let batch = ledger
            .receive_batch(NewBatch {
                product_id: id.clone(),
                batch_number: "B-002".to_string(),
                quantity: 12,
                expiry_date: date(2027, 1, 1),
                cost_cents: Money::from_cents(200),
            })
            .await
            .unwrap();

        ledger.set_quarantine(&batch.id, true).await.unwrap();
        let product = db.products().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(product.total_stock, 0);

        ledger.set_quarantine(&batch.id, false).await.unwrap();
        let product = db.products().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(product.total_stock, 12);
    }
}
