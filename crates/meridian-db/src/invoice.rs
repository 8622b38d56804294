//! # Invoice Sequencer
//!
//! Issues human-readable invoice numbers of the form `PREFIX-YYYYMMDD-SEQ`,
//! where SEQ is a 1-based, 4-digit zero-padded counter scoped to the
//! calendar day.
//!
//! ## Why Not "Count Today's Sales + 1"?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE COUNTING RACE                                                      │
//! │                                                                         │
//! │  Checkout A: SELECT COUNT(*) ... → 41                                  │
//! │  Checkout B: SELECT COUNT(*) ... → 41      (before A commits)          │
//! │  Both issue INV-20260825-0042 → UNIQUE violation or duplicate          │
//! │                                                                         │
//! │  OUR DESIGN: a per-day counter row bumped with an upsert               │
//! │  ... ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1            │
//! │  ... RETURNING last_seq                                                │
//! │                                                                         │
//! │  Run inside the SAME transaction as the sale insert, so an aborted     │
//! │  checkout also rolls the counter back.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `UNIQUE(invoice_number)` constraint on `sales` remains as a
//! backstop. A conflict means a sale already holds a number the counter
//! has not issued (restored backup, manual insert), so before retrying
//! the checkout path calls [`InvoiceSequencer::resync`], which advances
//! the counter past every number already present in `sales` for that
//! day. Without that step a retry would regenerate the same number and
//! fail the same way.
//!
//! The day key passed in must come from one timezone basis; the checkout
//! service derives it from its configured UTC offset so the counter scope
//! and the identifier's date segment can never disagree.

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

/// Issues day-scoped sequential invoice numbers.
#[derive(Debug, Clone)]
pub struct InvoiceSequencer {
    prefix: String,
}

impl InvoiceSequencer {
    /// Creates a sequencer with the given prefix (e.g. `"INV"`).
    pub fn new(prefix: impl Into<String>) -> Self {
        InvoiceSequencer {
            prefix: prefix.into(),
        }
    }

    /// Reserves the next sequence number for `day` and formats the
    /// invoice identifier.
    ///
    /// Must be called on the same transaction that inserts the sale:
    /// the counter bump commits or rolls back together with it.
    pub async fn next(&self, conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<String> {
        let day_key = day.format("%Y%m%d").to_string();

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_counters (day, last_seq)
            VALUES (?1, 1)
            ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(&day_key)
        .fetch_one(&mut *conn)
        .await?;

        let invoice_number = format!("{}-{}-{:04}", self.prefix, day_key, seq);
        debug!(invoice_number = %invoice_number, "Reserved invoice number");

        Ok(invoice_number)
    }

    /// Advances the counter past every invoice number already present in
    /// `sales` for `day`, so the next reservation cannot collide with a
    /// number the counter never issued.
    ///
    /// Must run on its own committed connection, NOT inside the failed
    /// sale transaction - the advance has to survive that rollback.
    pub async fn resync(&self, conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<()> {
        let day_key = day.format("%Y%m%d").to_string();
        let stem = format!("{}-{}-", self.prefix, day_key);

        sqlx::query(
            r#"
            INSERT INTO invoice_counters (day, last_seq)
            VALUES (
                ?1,
                COALESCE(
                    (SELECT MAX(CAST(substr(invoice_number, length(?2) + 1) AS INTEGER))
                     FROM sales
                     WHERE invoice_number LIKE ?2 || '%'),
                    0
                )
            )
            ON CONFLICT(day) DO UPDATE SET last_seq = MAX(last_seq, excluded.last_seq)
            "#,
        )
        .bind(&day_key)
        .bind(&stem)
        .execute(&mut *conn)
        .await?;

        debug!(day = %day_key, "Invoice counter resynced against sales");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
