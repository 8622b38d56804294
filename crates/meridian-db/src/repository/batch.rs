//! # Batch Repository
//!
//! Read surface and receipt inserts for expiry-dated stock lots.
//!
//! The sellable order is first-expiring-first-out; every listing here is
//! sorted `expiry_date ASC` so callers (checkout allocation, the expiry
//! sweep) see lots in consumption order.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use meridian_core::{Money, ProductBatch};

const BATCH_COLUMNS: &str = r#"
    id, product_id, batch_number,
    quantity, expiry_date, is_quarantined, cost_cents,
    created_at, updated_at
"#;

/// Fields needed to receive a lot into stock.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub product_id: String,
    pub batch_number: String,
    pub quantity: i64,
    pub expiry_date: NaiveDate,
    pub cost_cents: Money,
}

/// Repository for lot reads. Lot quantity mutations happen through the
/// stock ledger so the product aggregate stays in step.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Gets a batch by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductBatch>> {
        let batch = sqlx::query_as::<_, ProductBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM product_batches WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Lists a product's lots in consumption (expiry) order, including
    /// empty and quarantined lots for audit visibility.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        let batches = sqlx::query_as::<_, ProductBatch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM product_batches
            WHERE product_id = ?1
            ORDER BY expiry_date ASC, created_at ASC
            "#
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Lists non-empty, non-quarantined lots expiring within
    /// `window_days` of `today` (inclusive), soonest first.
    ///
    /// Already-expired lots with remaining quantity are included; the
    /// expiry sweep escalates those to critical.
    pub async fn list_expiring(
        &self,
        today: NaiveDate,
        window_days: i64,
    ) -> DbResult<Vec<ProductBatch>> {
        let cutoff = today + chrono::Duration::days(window_days);

        let batches = sqlx::query_as::<_, ProductBatch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM product_batches
            WHERE quantity > 0
              AND is_quarantined = 0
              AND expiry_date <= ?1
            ORDER BY expiry_date ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

}

/// Inserts a lot row without touching the product aggregate.
///
/// Callers almost always want [`crate::repository::stock::StockLedger::receive_batch`],
/// which inserts the lot and raises `total_stock` in one transaction.
pub(crate) async fn insert_row_on(
    conn: &mut sqlx::SqliteConnection,
    new: &NewBatch,
) -> DbResult<ProductBatch> {
    if new.quantity <= 0 {
        return Err(DbError::invalid_argument(format!(
            "batch quantity must be positive, got {}",
            new.quantity
        )));
    }

    debug!(
        product_id = %new.product_id,
        batch_number = %new.batch_number,
        quantity = new.quantity,
        "Inserting product batch"
    );

    let now = Utc::now();
    let batch = ProductBatch {
        id: Uuid::new_v4().to_string(),
        product_id: new.product_id.clone(),
        batch_number: new.batch_number.clone(),
        quantity: new.quantity,
        expiry_date: new.expiry_date,
        is_quarantined: false,
        cost_cents: new.cost_cents,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO product_batches (
            id, product_id, batch_number,
            quantity, expiry_date, is_quarantined, cost_cents,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.product_id)
    .bind(&batch.batch_number)
    .bind(batch.quantity)
    .bind(batch.expiry_date)
    .bind(batch.is_quarantined)
    .bind(batch.cost_cents)
    .bind(batch.created_at)
    .bind(batch.updated_at)
    .execute(conn)
    .await?;

    Ok(batch)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;

    async fn seeded_product(db: &Database) -> String {
        db.products()
            .insert(NewProduct {
                sku: "IBU-400".to_string(),
                name: "Ibuprofen 400mg".to_string(),
                description: None,
                cost_cents: Money::from_cents(300),
                price_cents: Money::from_cents(550),
                total_stock: 0,
                low_stock_threshold: 10,
                reorder_level: 20,
                category_id: None,
                supplier_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn lot(product_id: &str, number: &str, qty: i64, expiry: NaiveDate) -> NewBatch {
        NewBatch {
            product_id: product_id.to_string(),
            batch_number: number.to_string(),
            quantity: qty,
            expiry_date: expiry,
            cost_cents: Money::from_cents(300),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_lots_listed_in_expiry_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product_id = seeded_product(&db).await;
        let ledger = db.stock();

        ledger
            .receive_batch(lot(&product_id, "B-LATE", 20, date(2027, 6, 1)))
            .await
            .unwrap();
        ledger
            .receive_batch(lot(&product_id, "B-EARLY", 5, date(2026, 11, 1)))
            .await
            .unwrap();

        let lots = db.batches().list_for_product(&product_id).await.unwrap();
        let numbers: Vec<&str> = lots.iter().map(|b| b.batch_number.as_str()).collect();
        assert_eq!(numbers, vec!["B-EARLY", "B-LATE"]);
    }

    #[tokio::test]
    async fn test_list_expiring_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product_id = seeded_product(&db).await;
        let ledger = db.stock();
        let today = date(2026, 8, 25);

        ledger
            .receive_batch(lot(&product_id, "B-SOON", 10, date(2026, 9, 10)))
            .await
            .unwrap();
        ledger
            .receive_batch(lot(&product_id, "B-FAR", 10, date(2027, 8, 25)))
            .await
            .unwrap();

        let expiring = db.batches().list_expiring(today, 30).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].batch_number, "B-SOON");
    }
}
