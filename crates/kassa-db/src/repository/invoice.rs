//! # Invoice Repository
//!
//! Database operations for signed invoices and their line items.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │  There is no draft state in the signing core: an invoice arrives        │
//! │  here only after the security device signed it.                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT INTO signature_records (...)                         │   │
//! │  │  2. INSERT INTO invoices (..., signature_id)                    │   │
//! │  │  3. INSERT INTO invoice_lines (...)                             │   │
//! │  │  4. INSERT INTO dep_entries (...)                               │   │
//! │  │  5. INSERT INTO pending_submissions (...)                       │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← All five rows exist, or none of them do                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kassa_core::types::{Invoice, InvoiceLine};

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Inserts a signed invoice and its lines inside the caller's
    /// transaction. The signature record must already be inserted in the
    /// same transaction (foreign key).
    pub async fn insert_tx(
        conn: &mut SqliteConnection,
        invoice: &Invoice,
        lines: &[InvoiceLine],
    ) -> DbResult<()> {
        debug!(
            id = %invoice.id,
            receipt_number = %invoice.receipt_number,
            lines = lines.len(),
            "Inserting signed invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, cash_register_id, receipt_number, payment_method,
                subtotal_cents, tax_cents, total_cents,
                signature_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.cash_register_id)
        .bind(&invoice.receipt_number)
        .bind(invoice.payment_method)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.total_cents)
        .bind(&invoice.signature_id)
        .bind(invoice.created_at)
        .execute(&mut *conn)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    id, invoice_id, description, quantity,
                    unit_price_cents, line_total_cents, tax_bracket, tax_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.id)
            .bind(&line.invoice_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .bind(line.tax_bracket)
            .bind(line.tax_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, cash_register_id, receipt_number, payment_method,
                   subtotal_cents, tax_cents, total_cents,
                   signature_id, created_at
            FROM invoices
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Gets the line items of an invoice.
    pub async fn lines_for(&self, invoice_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT id, invoice_id, description, quantity,
                   unit_price_cents, line_total_cents, tax_bracket, tax_cents
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists the invoices of one register inside a half-open time range
    /// `[from, to)`, oldest first. Used by closing aggregation.
    pub async fn list_in_period(
        &self,
        cash_register_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, cash_register_id, receipt_number, payment_method,
                   subtotal_cents, tax_cents, total_cents,
                   signature_id, created_at
            FROM invoices
            WHERE cash_register_id = ?1
              AND created_at >= ?2
              AND created_at < ?3
            ORDER BY created_at ASC
            "#,
        )
        .bind(cash_register_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Lists all invoices of one calendar year, oldest first (year-end
    /// export).
    pub async fn list_for_year(&self, year: i32) -> DbResult<Vec<Invoice>> {
        let from = format!("{year}-01-01");
        let to = format!("{}-01-01", year + 1);

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, cash_register_id, receipt_number, payment_method,
                   subtotal_cents, tax_cents, total_cents,
                   signature_id, created_at
            FROM invoices
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Running gross turnover of one register in cents, the basis of the
    /// receipt string's turnover counter field.
    pub async fn turnover_cents(&self, cash_register_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(total_cents) FROM invoices WHERE cash_register_id = ?1",
        )
        .bind(cash_register_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }
}

// =============================================================================
// Receipt Number Generation
// =============================================================================

/// Generates a receipt number: date, register suffix, and a short unique
/// tail. Uniqueness is additionally enforced by the UNIQUE column.
pub fn generate_receipt_number(cash_register_id: &str) -> String {
    let now = Utc::now();
    let date_part = now.format("%Y%m%d");

    let register_code: String = cash_register_id
        .chars()
        .rev()
        .take(2)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    let tail = &Uuid::new_v4().simple().to_string()[..6];

    format!("{date_part}-{register_code}-{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::signature::SignatureRepository;
    use crate::repository::testutil::{test_db, test_signature};
    use kassa_core::types::{PaymentMethod, TaxBracket};

    #[test]
    fn test_receipt_numbers_are_unique() {
        let a = generate_receipt_number("AT-REG-001");
        let b = generate_receipt_number("AT-REG-001");
        assert_ne!(a, b);
        assert!(a.contains("-01-"));
    }

    fn invoice(signature_id: &str, total_cents: i64, created_at: DateTime<Utc>) -> Invoice {
        Invoice {
            id: Uuid::new_v4().to_string(),
            cash_register_id: "AT-REG-001".into(),
            receipt_number: generate_receipt_number("AT-REG-001"),
            payment_method: PaymentMethod::Cash,
            subtotal_cents: total_cents * 5 / 6,
            tax_cents: total_cents / 6,
            total_cents,
            signature_id: signature_id.to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_with_lines() {
        let db = test_db().await;
        let signature = test_signature(1);
        let inv = invoice(&signature.id, 12000, Utc::now());
        let line = InvoiceLine {
            id: Uuid::new_v4().to_string(),
            invoice_id: inv.id.clone(),
            description: "Espresso".into(),
            quantity: 4,
            unit_price_cents: 2500,
            line_total_cents: 10000,
            tax_bracket: TaxBracket::Standard,
            tax_cents: 2000,
        };

        let mut tx = db.begin().await.unwrap();
        SignatureRepository::insert_tx(&mut *tx, &signature)
            .await
            .unwrap();
        InvoiceRepository::insert_tx(&mut *tx, &inv, std::slice::from_ref(&line))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let loaded = db.invoices().get_by_id(&inv.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_cents, 12000);
        assert_eq!(loaded.signature_id, signature.id);

        let lines = db.invoices().lines_for(&inv.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].tax_bracket, TaxBracket::Standard);
    }

    #[tokio::test]
    async fn test_rollback_leaves_no_rows() {
        let db = test_db().await;
        let signature = test_signature(1);
        let inv = invoice(&signature.id, 12000, Utc::now());

        let mut tx = db.begin().await.unwrap();
        SignatureRepository::insert_tx(&mut *tx, &signature)
            .await
            .unwrap();
        InvoiceRepository::insert_tx(&mut *tx, &inv, &[]).await.unwrap();
        drop(tx); // rollback

        assert!(db.invoices().get_by_id(&inv.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_in_period_and_turnover() {
        let db = test_db().await;
        let now = Utc::now();

        for (counter, offset_hours) in [(1, 30), (2, 2), (3, 1)] {
            let signature = test_signature(counter);
            let inv = invoice(
                &signature.id,
                12000,
                now - chrono::Duration::hours(offset_hours),
            );

            let mut tx = db.begin().await.unwrap();
            SignatureRepository::insert_tx(&mut *tx, &signature)
                .await
                .unwrap();
            InvoiceRepository::insert_tx(&mut *tx, &inv, &[]).await.unwrap();
            tx.commit().await.unwrap();
        }

        // Last 24h window catches two of the three invoices.
        let in_period = db
            .invoices()
            .list_in_period("AT-REG-001", now - chrono::Duration::hours(24), now)
            .await
            .unwrap();
        assert_eq!(in_period.len(), 2);
        assert!(in_period[0].created_at <= in_period[1].created_at);

        assert_eq!(
            db.invoices().turnover_cents("AT-REG-001").await.unwrap(),
            36000
        );
        assert_eq!(db.invoices().turnover_cents("AT-REG-999").await.unwrap(), 0);
    }
}
