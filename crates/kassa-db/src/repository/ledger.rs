//! # Compliance Ledger Repository (DEP / Audit Trail)
//!
//! The append-only data-capture log of fiscal events.
//!
//! ## Append-Only Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    DEP Append-Only Guarantees                           │
//! │                                                                         │
//! │  • This repository exposes INSERT and SELECT. There is no UPDATE or     │
//! │    DELETE statement for dep_entries anywhere in the workspace.          │
//! │  • append_tx runs inside the caller's transaction: the ledger write     │
//! │    is part of the same unit of work as the signing it records.          │
//! │  • Export ordering is (created_at, seq): timestamp first, insertion     │
//! │    sequence breaking ties. Entries are immutable, so exporting the      │
//! │    same range twice is byte-identical.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kassa_core::types::{ComplianceLedgerEntry, LedgerEntryKind};

/// Repository for the DEP / audit trail.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends an entry inside the caller's transaction.
    ///
    /// Returns the stored entry including its database-assigned sequence
    /// number.
    pub async fn append_tx(
        conn: &mut SqliteConnection,
        kind: LedgerEntryKind,
        payload: &str,
    ) -> DbResult<ComplianceLedgerEntry> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO dep_entries (id, kind, payload, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&id)
        .bind(kind)
        .bind(payload)
        .bind(now)
        .execute(conn)
        .await?;

        let seq = result.last_insert_rowid();

        debug!(seq, ?kind, "Appended DEP entry");

        Ok(ComplianceLedgerEntry {
            id,
            seq,
            kind,
            payload: payload.to_string(),
            created_at: now,
        })
    }

    /// Appends an entry in its own transaction (standalone audit events).
    pub async fn append(
        &self,
        kind: LedgerEntryKind,
        payload: &str,
    ) -> DbResult<ComplianceLedgerEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = Self::append_tx(&mut *tx, kind, payload).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Exports all entries in `[from, to)`, ascending by timestamp with
    /// insertion sequence breaking ties.
    pub async fn export_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<ComplianceLedgerEntry>> {
        let entries = sqlx::query_as::<_, ComplianceLedgerEntry>(
            r#"
            SELECT id, seq, kind, payload, created_at
            FROM dep_entries
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// All entries of one calendar year (year-end export).
    pub async fn export_year(&self, year: i32) -> DbResult<Vec<ComplianceLedgerEntry>> {
        let from = format!("{year}-01-01");
        let to = format!("{}-01-01", year + 1);

        let entries = sqlx::query_as::<_, ComplianceLedgerEntry>(
            r#"
            SELECT id, seq, kind, payload, created_at
            FROM dep_entries
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Total number of ledger entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dep_entries")
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
    use crate::repository::testutil::test_db;

    #[tokio::test]
    async fn test_append_assigns_increasing_seq() {
        let db = test_db().await;
        let ledger = db.ledger();

        let first = ledger
            .append(LedgerEntryKind::Receipt, r#"{"receipt":"R-1"}"#)
            .await
            .unwrap();
        let second = ledger
            .append(LedgerEntryKind::Closing, r#"{"closing":"C-1"}"#)
            .await
            .unwrap();

        assert!(second.seq > first.seq);
        assert_eq!(ledger.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_export_range_is_ordered_and_stable() {
        let db = test_db().await;
        let ledger = db.ledger();

        for i in 0..5 {
            ledger
                .append(LedgerEntryKind::Receipt, &format!(r#"{{"n":{i}}}"#))
                .await
                .unwrap();
        }

        let from = Utc::now() - chrono::Duration::hours(1);
        let to = Utc::now() + chrono::Duration::hours(1);

        let first_export = ledger.export_range(from, to).await.unwrap();
        let second_export = ledger.export_range(from, to).await.unwrap();

        // Byte-identical across calls: entries are immutable.
        assert_eq!(
            serde_json::to_vec(&first_export).unwrap(),
            serde_json::to_vec(&second_export).unwrap()
        );

        // Strictly ordered by (created_at, seq).
        for pair in first_export.windows(2) {
            assert!(
                (pair[0].created_at, pair[0].seq) < (pair[1].created_at, pair[1].seq),
                "export out of order"
            );
        }
        assert_eq!(first_export.len(), 5);
    }

    #[tokio::test]
    async fn test_export_range_excludes_outside_entries() {
        let db = test_db().await;
        let ledger = db.ledger();

        ledger
            .append(LedgerEntryKind::Audit, r#"{"event":"export"}"#)
            .await
            .unwrap();

        let past_from = Utc::now() - chrono::Duration::days(2);
        let past_to = Utc::now() - chrono::Duration::days(1);
        let entries = ledger.export_range(past_from, past_to).await.unwrap();
        assert!(entries.is_empty());
    }
}
