//! # Pending Submission Repository
//!
//! The FinanzOnline outbox: invoices signed locally but not yet accepted by
//! the tax authority.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Submission Outbox Implementation                        │
//! │                                                                         │
//! │  LOCAL OPERATION (sign + persist invoice)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. INSERT invoice (+ signature, + DEP entry)                   │   │
//! │  │  2. INSERT INTO pending_submissions (state = 'pending')         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BACKGROUND QUEUE CYCLE (kassa-fiscal)                                  │
//! │  1. SELECT pending ORDER BY signed_at ASC  (oldest first)               │
//! │  2. Submit one at a time                                                │
//! │  3. Success → state = 'submitted', submitted_at = now                   │
//! │     Failure → attempts += 1, last_error recorded, retried next cycle    │
//! │  4. Older than retention window → state = 'cancelled' (logged)          │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                        │
//! │  • The invoice is never lost (it is signed and local)                   │
//! │  • The outbox row is never orphaned (same transaction)                  │
//! │  • Offline? Entries queue up. Back online? The cycle drains them.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kassa_core::types::{PendingSubmission, SubmissionState};

/// Repository for pending authority submissions.
#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    pool: SqlitePool,
}

const SELECT_SUBMISSION: &str = r#"
    SELECT id, invoice_id, signed_at, state,
           submitted_at, last_error, attempts, created_at
    FROM pending_submissions
"#;

impl SubmissionRepository {
    /// Creates a new SubmissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SubmissionRepository { pool }
    }

    /// Enqueues a submission record inside the caller's transaction, in the
    /// same unit of work as the signed invoice it refers to.
    pub async fn enqueue_tx(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        signed_at: DateTime<Utc>,
    ) -> DbResult<PendingSubmission> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(invoice_id = %invoice_id, "Enqueuing pending submission");

        let submission = PendingSubmission {
            id: id.clone(),
            invoice_id: invoice_id.to_string(),
            signed_at,
            state: SubmissionState::Pending,
            submitted_at: None,
            last_error: None,
            attempts: 0,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO pending_submissions (
                id, invoice_id, signed_at, state,
                submitted_at, last_error, attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&submission.id)
        .bind(&submission.invoice_id)
        .bind(submission.signed_at)
        .bind(submission.state)
        .bind(submission.submitted_at)
        .bind(&submission.last_error)
        .bind(submission.attempts)
        .bind(submission.created_at)
        .execute(conn)
        .await?;

        Ok(submission)
    }

    /// Gets all pending submissions ordered by original event date, oldest
    /// first. The authority expects roughly chronological arrival.
    pub async fn get_pending(&self) -> DbResult<Vec<PendingSubmission>> {
        let sql = format!(
            "{SELECT_SUBMISSION}
            WHERE state = ?1
            ORDER BY signed_at ASC"
        );

        let submissions = sqlx::query_as::<_, PendingSubmission>(&sql)
            .bind(SubmissionState::Pending)
            .fetch_all(&self.pool)
            .await?;

        Ok(submissions)
    }

    /// Gets one submission by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<PendingSubmission> {
        let sql = format!("{SELECT_SUBMISSION} WHERE id = ?1");

        sqlx::query_as::<_, PendingSubmission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "pending submission".to_string(),
                id: id.to_string(),
            })
    }

    /// Gets the submission record for an invoice, if any.
    pub async fn get_by_invoice(&self, invoice_id: &str) -> DbResult<Option<PendingSubmission>> {
        let sql = format!("{SELECT_SUBMISSION} WHERE invoice_id = ?1");

        let submission = sqlx::query_as::<_, PendingSubmission>(&sql)
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(submission)
    }

    /// Marks a submission as accepted by the authority.
    pub async fn mark_submitted(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE pending_submissions SET
                state = ?2,
                submitted_at = ?3,
                attempts = attempts + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SubmissionState::Submitted)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed submission attempt; the record stays pending.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE pending_submissions SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists pending records whose event date lies before the cutoff
    /// (candidates for retention archival).
    pub async fn list_expired(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<PendingSubmission>> {
        let sql = format!(
            "{SELECT_SUBMISSION}
            WHERE state = ?1 AND signed_at < ?2
            ORDER BY signed_at ASC"
        );

        let submissions = sqlx::query_as::<_, PendingSubmission>(&sql)
            .bind(SubmissionState::Pending)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        Ok(submissions)
    }

    /// Archives one record (retention window exceeded). The queue logs
    /// every archival; this only flips the state.
    pub async fn mark_cancelled(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE pending_submissions SET state = ?2 WHERE id = ?1")
            .bind(id)
            .bind(SubmissionState::Cancelled)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Counts records still pending (operator visibility).
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_submissions WHERE state = ?1")
                .bind(SubmissionState::Pending)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::invoice::InvoiceRepository;
    use crate::repository::signature::SignatureRepository;
    use crate::repository::testutil::{test_db, test_signature};
    use kassa_core::types::{Invoice, PaymentMethod};

    /// Inserts a signed invoice and enqueues its submission, returning the
    /// submission id.
    async fn enqueue_invoice(
        db: &Database,
        counter: i64,
        signed_at: DateTime<Utc>,
    ) -> PendingSubmission {
        let signature = test_signature(counter);
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            cash_register_id: "AT-REG-001".into(),
            receipt_number: format!("R-{counter}"),
            payment_method: PaymentMethod::Cash,
            subtotal_cents: 10000,
            tax_cents: 2000,
            total_cents: 12000,
            signature_id: signature.id.clone(),
            created_at: signed_at,
        };

        let mut tx = db.begin().await.unwrap();
        SignatureRepository::insert_tx(&mut *tx, &signature)
            .await
            .unwrap();
        InvoiceRepository::insert_tx(&mut *tx, &invoice, &[])
            .await
            .unwrap();
        let submission = SubmissionRepository::enqueue_tx(&mut *tx, &invoice.id, signed_at)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        submission
    }

    #[tokio::test]
    async fn test_pending_ordered_oldest_first() {
        let db = test_db().await;
        let now = Utc::now();

        // Enqueue newest first to prove ordering comes from signed_at.
        enqueue_invoice(&db, 3, now).await;
        enqueue_invoice(&db, 1, now - chrono::Duration::hours(2)).await;
        enqueue_invoice(&db, 2, now - chrono::Duration::hours(1)).await;

        let pending = db.submissions().get_pending().await.unwrap();
        let counters: Vec<&str> = pending
            .iter()
            .map(|p| p.invoice_id.as_str())
            .collect();
        assert_eq!(pending.len(), 3);
        assert!(pending.windows(2).all(|w| w[0].signed_at <= w[1].signed_at));
        assert_eq!(counters.len(), 3);
    }

    #[tokio::test]
    async fn test_mark_submitted_removes_from_pending() {
        let db = test_db().await;
        let submission = enqueue_invoice(&db, 1, Utc::now()).await;

        assert_eq!(db.submissions().count_pending().await.unwrap(), 1);

        db.submissions().mark_submitted(&submission.id).await.unwrap();

        assert_eq!(db.submissions().count_pending().await.unwrap(), 0);
        let reloaded = db.submissions().get_by_id(&submission.id).await.unwrap();
        assert_eq!(reloaded.state, SubmissionState::Submitted);
        assert!(reloaded.submitted_at.is_some());
        assert_eq!(reloaded.attempts, 1);
    }

    #[tokio::test]
    async fn test_mark_failed_keeps_pending_and_records_error() {
        let db = test_db().await;
        let submission = enqueue_invoice(&db, 1, Utc::now()).await;

        db.submissions()
            .mark_failed(&submission.id, "authority rejected: 503")
            .await
            .unwrap();

        let reloaded = db.submissions().get_by_id(&submission.id).await.unwrap();
        assert_eq!(reloaded.state, SubmissionState::Pending);
        assert_eq!(
            reloaded.last_error.as_deref(),
            Some("authority rejected: 503")
        );
        assert_eq!(reloaded.attempts, 1);
        assert_eq!(db.submissions().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_records_can_be_cancelled() {
        let db = test_db().await;
        let old = enqueue_invoice(&db, 1, Utc::now() - chrono::Duration::days(40)).await;
        enqueue_invoice(&db, 2, Utc::now()).await;

        let cutoff = Utc::now() - chrono::Duration::days(30);
        let expired = db.submissions().list_expired(cutoff).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, old.id);

        db.submissions().mark_cancelled(&old.id).await.unwrap();

        assert_eq!(db.submissions().count_pending().await.unwrap(), 1);
        let reloaded = db.submissions().get_by_id(&old.id).await.unwrap();
        assert_eq!(reloaded.state, SubmissionState::Cancelled);
    }
}
