//! # Sale Repository
//!
//! Read side for completed sales plus the one mutation sales admit:
//! the guarded status transition `Completed → Cancelled | Refunded`.
//!
//! Sale and item inserts are `_on` functions so they compose into the
//! checkout transaction; there is no pool-level "insert a sale" because
//! a sale that did not go through checkout would bypass the invoice
//! sequencer and the stock guard.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use meridian_core::{Sale, SaleItem, SaleStatus, SaleWithItems};

const SALE_COLUMNS: &str = r#"
    id, invoice_number, status,
    subtotal_cents, discount_cents, tax_cents, total_cents,
    amount_paid_cents, change_cents, payment_method,
    cashier_id, customer_name, customer_phone, notes,
    created_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, sale_id, product_id,
    sku_snapshot, name_snapshot,
    quantity, unit_price_cents, discount_cents, total_cents,
    created_at
"#;

// =============================================================================
// Transaction-Scoped Inserts
// =============================================================================

/// Inserts a sale header on the given connection.
pub(crate) async fn insert_sale_on(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, invoice_number, status,
            subtotal_cents, discount_cents, tax_cents, total_cents,
            amount_paid_cents, change_cents, payment_method,
            cashier_id, customer_name, customer_phone, notes,
            created_at
        ) VALUES (
            ?1, ?2, ?3,
            ?4, ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15
        )
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.invoice_number)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.amount_paid_cents)
    .bind(sale.change_cents)
    .bind(sale.payment_method)
    .bind(&sale.cashier_id)
    .bind(&sale.customer_name)
    .bind(&sale.customer_phone)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Inserts a sale line on the given connection.
pub(crate) async fn insert_item_on(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id,
            sku_snapshot, name_snapshot,
            quantity, unit_price_cents, discount_cents, total_cents,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.discount_cents)
    .bind(item.total_cents)
    .bind(item.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Sale Repository
// =============================================================================

/// Repository for sale reads and the status transition.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets a sale header by its invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE invoice_number = ?1"
        ))
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets a sale's lines in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets a sale together with its lines.
    pub async fn get_with_items(&self, sale_id: &str) -> DbResult<Option<SaleWithItems>> {
        let Some(sale) = self.get_by_id(sale_id).await? else {
            return Ok(None);
        };
        let items = self.get_items(sale_id).await?;
        Ok(Some(SaleWithItems { sale, items }))
    }

    /// Lists sales whose business timestamp falls within `[start, end)`
    /// (dates, exclusive end), newest first.
    pub async fn list(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at DESC
            LIMIT ?3 OFFSET ?4
            "#
        ))
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Transitions a completed sale to `Cancelled` or `Refunded`.
    ///
    /// ## Returns
    /// * `Err(DbError::InvalidArgument)` - target is not an allowed end state
    /// * `Err(DbError::NotFound)` - sale missing or not currently `Completed`
    ///
    /// Stock restitution for refunds is a manual ledger adjustment; the
    /// units may no longer be sellable.
    pub async fn set_status(&self, sale_id: &str, target: SaleStatus) -> DbResult<()> {
        if !matches!(target, SaleStatus::Cancelled | SaleStatus::Refunded) {
            return Err(DbError::invalid_argument(format!(
                "sales can only move to cancelled or refunded, not {target:?}"
            )));
        }

        let result = sqlx::query(
            "UPDATE sales SET status = ?1 WHERE id = ?2 AND status = 'completed'",
        )
        .bind(target)
        .bind(sale_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Completed sale", sale_id));
        }

        info!(sale_id = %sale_id, status = ?target, "Sale status updated");
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
    use chrono::Utc;
    use meridian_core::{Money, PaymentMethod};
    use uuid::Uuid;

    async fn insert_completed_sale(db: &Database) -> String {
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            invoice_number: format!("INV-20260825-{:04}", 1),
            status: SaleStatus::Completed,
            subtotal_cents: Money::from_cents(1950),
            discount_cents: Money::zero(),
            tax_cents: Money::zero(),
            total_cents: Money::from_cents(1950),
            amount_paid_cents: Money::from_cents(2000),
            change_cents: Money::from_cents(50),
            payment_method: PaymentMethod::Cash,
            cashier_id: "cashier-1".to_string(),
            customer_name: None,
            customer_phone: None,
            notes: None,
            created_at: Utc::now(),
        };

        let mut conn = db.pool().acquire().await.unwrap();
        insert_sale_on(&mut conn, &sale).await.unwrap();
        sale.id
    }

    #[tokio::test]
    async fn test_status_transition_completed_to_refunded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sale_id = insert_completed_sale(&db).await;
        let repo = db.sales();

        repo.set_status(&sale_id, SaleStatus::Refunded).await.unwrap();

        let sale = repo.get_by_id(&sale_id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Refunded);

        // Refunded is terminal; a second transition finds no completed row.
        let err = repo.set_status(&sale_id, SaleStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_status_transition_rejects_bad_target() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sale_id = insert_completed_sale(&db).await;

        let err = db
            .sales()
            .set_status(&sale_id, SaleStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));
    }
}
