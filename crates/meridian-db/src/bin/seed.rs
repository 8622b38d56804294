//! Seeds a development database with a small pharmacy catalog and
//! expiry-dated lots.
//!
//! ```bash
//! MERIDIAN_DB=./meridian-dev.db cargo run --bin seed
//! ```

use chrono::{Duration, Utc};
use tracing::{info, warn};

use meridian_core::Money;
use meridian_db::{Database, DbConfig, NewBatch, NewProduct};

struct SeedProduct {
    sku: &'static str,
    name: &'static str,
    cost_cents: i64,
    price_cents: i64,
    low_stock_threshold: i64,
    /// (batch number, quantity, days until expiry)
    lots: &'static [(&'static str, i64, i64)],
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        sku: "PARA-500",
        name: "Paracetamol 500mg (100 tabs)",
        cost_cents: 450,
        price_cents: 800,
        low_stock_threshold: 20,
        lots: &[("PB-2412", 80, 120), ("PB-2501", 120, 300)],
    },
    SeedProduct {
        sku: "AMOX-250",
        name: "Amoxicillin 250mg (30 caps)",
        cost_cents: 900,
        price_cents: 1500,
        low_stock_threshold: 15,
        lots: &[("AX-2411", 40, 60), ("AX-2502", 60, 240)],
    },
    SeedProduct {
        sku: "IBU-400",
        name: "Ibuprofen 400mg (50 tabs)",
        cost_cents: 350,
        price_cents: 650,
        low_stock_threshold: 20,
        lots: &[("IB-2503", 150, 400)],
    },
    SeedProduct {
        sku: "ORS-SACHET",
        name: "Oral Rehydration Salts (sachet)",
        cost_cents: 80,
        price_cents: 150,
        low_stock_threshold: 50,
        lots: &[("OR-2410", 30, 25), ("OR-2504", 200, 500)],
    },
    SeedProduct {
        sku: "GLOVE-M",
        name: "Examination Gloves M (box of 100)",
        cost_cents: 1800,
        price_cents: 2500,
        low_stock_threshold: 5,
        // Non-lotted goods: aggregate stock only.
        lots: &[],
    },
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::var("MERIDIAN_DB").unwrap_or_else(|_| "meridian-dev.db".to_string());
    info!(path = %path, "Seeding development database");

    let db = Database::new(DbConfig::new(&path)).await?;
    let products = db.products();
    let ledger = db.stock();
    let today = Utc::now().date_naive();

    for entry in CATALOG {
        if products.get_by_sku(entry.sku).await?.is_some() {
            warn!(sku = entry.sku, "Already seeded, skipping");
            continue;
        }

        let lotless_stock = if entry.lots.is_empty() { 40 } else { 0 };
        let product = products
            .insert(NewProduct {
                sku: entry.sku.to_string(),
                name: entry.name.to_string(),
                description: None,
                cost_cents: Money::from_cents(entry.cost_cents),
                price_cents: Money::from_cents(entry.price_cents),
                total_stock: lotless_stock,
                low_stock_threshold: entry.low_stock_threshold,
                reorder_level: entry.low_stock_threshold * 2,
                category_id: None,
                supplier_id: None,
            })
            .await?;

        for (batch_number, quantity, days_out) in entry.lots {
            ledger
                .receive_batch(NewBatch {
                    product_id: product.id.clone(),
                    batch_number: batch_number.to_string(),
                    quantity: *quantity,
                    expiry_date: today + Duration::days(*days_out),
                    cost_cents: Money::from_cents(entry.cost_cents),
                })
                .await?;
        }

        info!(sku = entry.sku, lots = entry.lots.len(), "Seeded product");
    }

    db.close().await;
    info!("Seed complete");
    Ok(())
}
