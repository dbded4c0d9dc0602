//! # Signature Record Repository
//!
//! Persistence for [`SignatureRecord`]s. Records are written once, inside
//! the same transaction as the invoice or closing they sign, and never
//! updated afterwards.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kassa_core::types::SignatureRecord;

/// Repository for signature records.
#[derive(Debug, Clone)]
pub struct SignatureRepository {
    pool: SqlitePool,
}

impl SignatureRepository {
    /// Creates a new SignatureRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SignatureRepository { pool }
    }

    /// Inserts a signature record inside the caller's transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, record: &SignatureRecord) -> DbResult<()> {
        debug!(
            id = %record.id,
            counter = record.signature_counter,
            "Inserting signature record"
        );

        sqlx::query(
            r#"
            INSERT INTO signature_records (
                id, signature_value, signature_counter,
                device_serial, process_type, signed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.id)
        .bind(&record.signature_value)
        .bind(record.signature_counter)
        .bind(&record.device_serial)
        .bind(record.process_type)
        .bind(record.signed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets a signature record by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SignatureRecord>> {
        let record = sqlx::query_as::<_, SignatureRecord>(
            r#"
            SELECT id, signature_value, signature_counter,
                   device_serial, process_type, signed_at
            FROM signature_records
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// The most recently inserted compact signature value, used to derive
    /// the chain value of the next receipt. One register per database, as
    /// with the rest of the core.
    pub async fn last_signature_value(&self) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT signature_value FROM signature_records ORDER BY rowid DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }
}
