//! # Closing Repository
//!
//! Persistence for signed closings (Tagesabschluss and its monthly/yearly
//! siblings).
//!
//! Idempotence per (register, date, period) key is enforced by the partial
//! UNIQUE index over completed rows: a losing racer gets a constraint
//! violation, which the coordinator maps to the "already closed" outcome.

use chrono::NaiveDate;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kassa_core::types::{
    ClosingPeriod, ClosingRecord, ClosingStatus, ClosingTotals, PaymentBreakdown, SignatureRecord,
    TaxBreakdown,
};

// =============================================================================
// Row Mapping
// =============================================================================

/// Flat database row of a closing; breakdowns are JSON columns.
#[derive(Debug, FromRow)]
struct ClosingRow {
    id: String,
    cash_register_id: String,
    closing_date: NaiveDate,
    period_type: ClosingPeriod,
    total_cents: i64,
    tax_cents: i64,
    tax_breakdown: String,
    payment_breakdown: String,
    invoice_count: i64,
    status: ClosingStatus,
    created_at: chrono::DateTime<chrono::Utc>,
    // Signature columns joined from signature_records.
    sig_id: String,
    signature_value: String,
    signature_counter: i64,
    device_serial: String,
    process_type: kassa_core::types::ProcessType,
    signed_at: chrono::DateTime<chrono::Utc>,
}

impl ClosingRow {
    fn into_record(self) -> DbResult<ClosingRecord> {
        let tax_breakdown: TaxBreakdown = serde_json::from_str(&self.tax_breakdown)?;
        let payment_breakdown: PaymentBreakdown = serde_json::from_str(&self.payment_breakdown)?;

        Ok(ClosingRecord {
            id: self.id,
            cash_register_id: self.cash_register_id,
            closing_date: self.closing_date,
            period_type: self.period_type,
            totals: ClosingTotals {
                total_cents: self.total_cents,
                tax_cents: self.tax_cents,
                tax_breakdown,
                payment_breakdown,
            },
            invoice_count: self.invoice_count,
            signature: SignatureRecord {
                id: self.sig_id,
                signature_value: self.signature_value,
                signature_counter: self.signature_counter,
                device_serial: self.device_serial,
                process_type: self.process_type,
                signed_at: self.signed_at,
            },
            status: self.status,
            created_at: self.created_at,
        })
    }
}

const SELECT_CLOSING: &str = r#"
    SELECT c.id, c.cash_register_id, c.closing_date, c.period_type,
           c.total_cents, c.tax_cents, c.tax_breakdown, c.payment_breakdown,
           c.invoice_count, c.status, c.created_at,
           s.id AS sig_id, s.signature_value, s.signature_counter,
           s.device_serial, s.process_type, s.signed_at
    FROM closings c
    JOIN signature_records s ON s.id = c.signature_id
"#;

// =============================================================================
// Closing Repository
// =============================================================================

/// Repository for closing records.
#[derive(Debug, Clone)]
pub struct ClosingRepository {
    pool: SqlitePool,
}

impl ClosingRepository {
    /// Creates a new ClosingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClosingRepository { pool }
    }

    /// Inserts a completed closing inside the caller's transaction. The
    /// signature record must already be inserted in the same transaction.
    ///
    /// Returns [`DbError::UniqueViolation`] when a completed closing for
    /// the same (register, date, period) key already exists.
    pub async fn insert_tx(conn: &mut SqliteConnection, record: &ClosingRecord) -> DbResult<()> {
        debug!(
            id = %record.id,
            register = %record.cash_register_id,
            date = %record.closing_date,
            period = %record.period_type,
            "Inserting closing record"
        );

        let tax_breakdown = serde_json::to_string(&record.totals.tax_breakdown)?;
        let payment_breakdown = serde_json::to_string(&record.totals.payment_breakdown)?;

        sqlx::query(
            r#"
            INSERT INTO closings (
                id, cash_register_id, closing_date, period_type,
                total_cents, tax_cents, tax_breakdown, payment_breakdown,
                invoice_count, signature_id, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&record.id)
        .bind(&record.cash_register_id)
        .bind(record.closing_date)
        .bind(record.period_type)
        .bind(record.totals.total_cents)
        .bind(record.totals.tax_cents)
        .bind(tax_breakdown)
        .bind(payment_breakdown)
        .bind(record.invoice_count)
        .bind(&record.signature.id)
        .bind(record.status)
        .bind(record.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Finds the completed closing for a period key, if any.
    pub async fn find_completed(
        &self,
        cash_register_id: &str,
        closing_date: NaiveDate,
        period_type: ClosingPeriod,
    ) -> DbResult<Option<ClosingRecord>> {
        let sql = format!(
            "{SELECT_CLOSING}
            WHERE c.cash_register_id = ?1
              AND c.closing_date = ?2
              AND c.period_type = ?3
              AND c.status = ?4"
        );

        let row = sqlx::query_as::<_, ClosingRow>(&sql)
            .bind(cash_register_id)
            .bind(closing_date)
            .bind(period_type)
            .bind(ClosingStatus::Completed)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ClosingRow::into_record).transpose()
    }

    /// Gets a closing by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<ClosingRecord> {
        let sql = format!("{SELECT_CLOSING} WHERE c.id = ?1");

        let row = sqlx::query_as::<_, ClosingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.into_record(),
            None => Err(DbError::NotFound {
                entity: "closing".to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// All completed closings of one calendar year, oldest first (year-end
    /// export).
    pub async fn list_for_year(&self, year: i32) -> DbResult<Vec<ClosingRecord>> {
        let from = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid year start");
        let to = NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("valid year end");

        let sql = format!(
            "{SELECT_CLOSING}
            WHERE c.closing_date >= ?1 AND c.closing_date < ?2
              AND c.status = ?3
            ORDER BY c.closing_date ASC, c.created_at ASC"
        );

        let rows = sqlx::query_as::<_, ClosingRow>(&sql)
            .bind(from)
            .bind(to)
            .bind(ClosingStatus::Completed)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ClosingRow::into_record).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::signature::SignatureRepository;
    use crate::repository::testutil::{test_db, test_signature};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(signature: SignatureRecord) -> ClosingRecord {
        ClosingRecord {
            id: Uuid::new_v4().to_string(),
            cash_register_id: "AT-REG-001".into(),
            closing_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            period_type: ClosingPeriod::Daily,
            totals: ClosingTotals {
                total_cents: 12000,
                tax_cents: 2000,
                ..Default::default()
            },
            invoice_count: 3,
            signature,
            status: ClosingStatus::Completed,
            created_at: Utc::now(),
        }
    }

    async fn insert(db: &crate::pool::Database, closing: &ClosingRecord) -> DbResult<()> {
        let mut tx = db.begin().await?;
        SignatureRepository::insert_tx(&mut *tx, &closing.signature).await?;
        ClosingRepository::insert_tx(&mut *tx, closing).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_and_find_completed() {
        let db = test_db().await;
        let closing = record(test_signature(1));

        insert(&db, &closing).await.unwrap();

        let found = db
            .closings()
            .find_completed(
                "AT-REG-001",
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                ClosingPeriod::Daily,
            )
            .await
            .unwrap()
            .expect("closing exists");

        assert_eq!(found.id, closing.id);
        assert_eq!(found.totals.total_cents, 12000);
        assert_eq!(found.signature.signature_counter, 1);
    }

    #[tokio::test]
    async fn test_second_completed_closing_is_rejected() {
        let db = test_db().await;

        insert(&db, &record(test_signature(1))).await.unwrap();

        // Same (register, date, period) key, different id and signature.
        let duplicate = record(test_signature(2));
        let err = insert(&db, &duplicate).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_different_period_keys_coexist() {
        let db = test_db().await;

        insert(&db, &record(test_signature(1))).await.unwrap();

        let mut monthly = record(test_signature(2));
        monthly.period_type = ClosingPeriod::Monthly;
        insert(&db, &monthly).await.unwrap();

        let mut other_day = record(test_signature(3));
        other_day.closing_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        insert(&db, &other_day).await.unwrap();
    }
}
