//! # Product Repository
//!
//! Catalog read surface consumed by checkout and the alert worker, plus
//! the inserts the seed binary and tests need.
//!
//! Stock mutations do NOT live here; see [`crate::repository::stock`].

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use meridian_core::{Money, Product};

/// All columns of `products`, in struct order.
const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, description,
    cost_cents, price_cents,
    total_stock, low_stock_threshold, reorder_level,
    category_id, supplier_id, is_active,
    created_at, updated_at
"#;

/// Fields needed to register a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub cost_cents: Money,
    pub price_cents: Money,
    pub total_stock: i64,
    pub low_stock_threshold: i64,
    pub reorder_level: i64,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
}

/// Repository for product reads and catalog inserts.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        get_on(&mut conn, id).await
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products at or below their low-stock threshold.
    ///
    /// Consumed by the notification worker; ordered worst-first.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE is_active = 1 AND total_stock <= low_stock_threshold
            ORDER BY total_stock ASC, name
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products holding stock with no sale line since
    /// `since`: capital sitting on the shelf.
    pub async fn list_dead_stock(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE is_active = 1
              AND total_stock > 0
              AND NOT EXISTS (
                  SELECT 1 FROM sale_items si
                  JOIN sales s ON s.id = si.sale_id
                  WHERE si.product_id = products.id AND s.created_at >= ?1
              )
            ORDER BY name
            "#
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - the inserted product with generated fields
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        debug!(sku = %new.sku, "Inserting product");

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: new.sku,
            name: new.name,
            description: new.description,
            cost_cents: new.cost_cents,
            price_cents: new.price_cents,
            total_stock: new.total_stock,
            low_stock_threshold: new.low_stock_threshold,
            reorder_level: new.reorder_level,
            category_id: new.category_id,
            supplier_id: new.supplier_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description,
                cost_cents, price_cents,
                total_stock, low_stock_threshold, reorder_level,
                category_id, supplier_id, is_active,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.total_stock)
        .bind(product.low_stock_threshold)
        .bind(product.reorder_level)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Soft-deletes a product by setting `is_active = 0`.
    ///
    /// Historical sale items still reference it, so rows are never
    /// physically removed.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

/// Connection-scoped product lookup, used inside the checkout transaction.
pub(crate) async fn get_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            cost_cents: Money::from_cents(500),
            price_cents: Money::from_cents(800),
            total_stock: stock,
            low_stock_threshold: 10,
            reorder_level: 20,
            category_id: None,
            supplier_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let inserted = repo.insert(sample("PARA-500", 40)).await.unwrap();
        let fetched = repo.get_by_id(&inserted.id).await.unwrap().unwrap();

        assert_eq!(fetched.sku, "PARA-500");
        assert_eq!(fetched.total_stock, 40);
        assert_eq!(fetched.price_cents, Money::from_cents(800));
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(sample("AMOX-250", 10)).await.unwrap();
        let err = repo.insert(sample("AMOX-250", 10)).await.unwrap_err();

        assert!(err.is_unique_violation_on("sku"));
    }

    #[tokio::test]
    async fn test_list_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(sample("OK-1", 50)).await.unwrap();
        repo.insert(sample("LOW-1", 3)).await.unwrap();
        repo.insert(sample("OUT-1", 0)).await.unwrap();

        let low = repo.list_low_stock().await.unwrap();
        let skus: Vec<&str> = low.iter().map(|p| p.sku.as_str()).collect();

        assert_eq!(skus, vec!["OUT-1", "LOW-1"]);
    }
}
