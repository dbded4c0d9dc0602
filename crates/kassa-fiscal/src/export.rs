//! # Year-End Export
//!
//! Builds the read-only JSON bundle submitted to the tax authority at year
//! end: raw receipts, the DEP trail, and the audit log of one calendar
//! year, combined with the year's completed closings.
//!
//! The export only reads. No query in this module mutates a record, and
//! because every exported row is immutable, producing the same year twice
//! yields byte-identical JSON.

use serde::{Deserialize, Serialize};
use tracing::info;

use kassa_core::types::{ClosingRecord, ComplianceLedgerEntry, Invoice, InvoiceLine, LedgerEntryKind};
use kassa_db::Database;

use crate::error::FiscalResult;

// =============================================================================
// Bundle Shapes
// =============================================================================

/// One receipt of the export: the invoice, its lines, and the compact
/// signature that issued it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptExport {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub signature_value: String,
}

/// The year-end submission bundle (camelCase on the wire: periodYear,
/// receipts, depEntries, auditLogs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearEndExport {
    pub period_year: i32,
    pub receipts: Vec<ReceiptExport>,
    pub dep_entries: Vec<ComplianceLedgerEntry>,
    pub audit_logs: Vec<ComplianceLedgerEntry>,
    pub closings: Vec<ClosingRecord>,
}

// =============================================================================
// Exporter
// =============================================================================

/// Read-only year-end exporter.
pub struct YearEndExporter {
    db: Database,
}

impl YearEndExporter {
    /// Creates an exporter.
    pub fn new(db: Database) -> Self {
        YearEndExporter { db }
    }

    /// Builds the bundle for one calendar year.
    pub async fn export_year(&self, year: i32) -> FiscalResult<YearEndExport> {
        let invoices = self.db.invoices().list_for_year(year).await?;

        let mut receipts = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let lines = self.db.invoices().lines_for(&invoice.id).await?;
            let signature = self
                .db
                .signatures()
                .get_by_id(&invoice.signature_id)
                .await?;
            let signature_value = signature
                .map(|s| s.signature_value)
                .unwrap_or_default();

            receipts.push(ReceiptExport {
                invoice,
                lines,
                signature_value,
            });
        }

        let all_entries = self.db.ledger().export_year(year).await?;
        let (audit_logs, dep_entries): (Vec<_>, Vec<_>) = all_entries
            .into_iter()
            .partition(|e| e.kind == LedgerEntryKind::Audit);

        let closings = self.db.closings().list_for_year(year).await?;

        info!(
            year,
            receipts = receipts.len(),
            dep_entries = dep_entries.len(),
            audit_logs = audit_logs.len(),
            closings = closings.len(),
            "Built year-end export bundle"
        );

        Ok(YearEndExport {
            period_year: year,
            receipts,
            dep_entries,
            audit_logs,
            closings,
        })
    }

    /// Serializes the bundle. Stable field order, so repeated exports of
    /// the same year are byte-identical.
    pub async fn export_year_json(&self, year: i32) -> FiscalResult<String> {
        let bundle = self.export_year(year).await?;
        Ok(serde_json::to_string_pretty(&bundle)?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
