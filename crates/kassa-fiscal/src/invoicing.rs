//! # Invoice Service
//!
//! The request-path orchestration of a sale: validate, sign, persist, and
//! (when the portal is reachable) submit.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_invoice()                                   │
//! │                                                                         │
//! │  1. Validate request              ── rejection before any signing       │
//! │  2. TransactionSigner.sign()      ── fail-closed; an error here means   │
//! │                                      NO invoice, NO ledger entry,       │
//! │                                      NO pending submission              │
//! │  3. SINGLE TRANSACTION:                                                 │
//! │       signature record + invoice + lines + DEP entry +                  │
//! │       pending submission                                                │
//! │  4. Portal reachable? one immediate submission attempt.                 │
//! │     Failure marks the record failed and is otherwise ignored:           │
//! │     remote submission NEVER fails the originating sale.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use kassa_core::receipt::{chain_value, ProcessData};
use kassa_core::request::InvoiceRequest;
use kassa_core::types::{
    Invoice, InvoiceLine, LedgerEntryKind, NetworkSnapshot, ProcessType, SignatureRecord,
};
use kassa_core::validation::validate_invoice_request;
use kassa_db::{
    generate_receipt_number, Database, InvoiceRepository, LedgerRepository, SignatureRepository,
    SubmissionRepository,
};
use kassa_signing::TransactionSigner;

use crate::authority::{AuthorityClient, SubmissionPayload};
use crate::config::RegisterConfig;
use crate::error::FiscalResult;

// =============================================================================
// Issued Invoice
// =============================================================================

/// The result of a successfully issued (signed + persisted) invoice.
#[derive(Debug, Clone)]
pub struct IssuedInvoice {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub signature: SignatureRecord,
    /// Whether the authority accepted the record immediately. When false,
    /// the submission stays pending and the queue retries it.
    pub submitted: bool,
}

// =============================================================================
// Invoice Service
// =============================================================================

/// Issues signed invoices and null receipts.
pub struct InvoiceService<A> {
    db: Database,
    signer: Arc<TransactionSigner>,
    authority: Arc<A>,
    status_rx: watch::Receiver<NetworkSnapshot>,
    register: RegisterConfig,
}

impl<A: AuthorityClient> InvoiceService<A> {
    /// Creates the service. `status_rx` comes from the network monitor's
    /// `subscribe()`.
    pub fn new(
        db: Database,
        signer: Arc<TransactionSigner>,
        authority: Arc<A>,
        status_rx: watch::Receiver<NetworkSnapshot>,
        register: RegisterConfig,
    ) -> Self {
        InvoiceService {
            db,
            signer,
            authority,
            status_rx,
            register,
        }
    }

    /// Issues one signed invoice, fail-closed.
    pub async fn create_invoice(&self, request: InvoiceRequest) -> FiscalResult<IssuedInvoice> {
        validate_invoice_request(&request)?;

        let subtotal = request.subtotal();
        let tax = request.tax();
        let total = request.total();
        let receipt_number = generate_receipt_number(&request.cash_register_id);

        // Chain and turnover state read before signing; the canonical string
        // links this receipt to the previous signature.
        let previous_signature = self.db.signatures().last_signature_value().await?;
        let turnover = self
            .db
            .invoices()
            .turnover_cents(&request.cash_register_id)
            .await?;

        let data = ProcessData {
            process_type: ProcessType::Sign,
            cash_register_id: request.cash_register_id.clone(),
            receipt_number: receipt_number.clone(),
            timestamp: chrono::Utc::now(), // replaced by the signer
            bracket_amounts: request.bracket_amounts(),
            turnover_counter_cents: turnover + total.cents(),
            certificate_serial: self.register.certificate_serial.clone(),
            chain_value: chain_value(previous_signature.as_deref(), &request.cash_register_id),
        };

        // Fail-closed: any signing error aborts here, before persistence.
        let signed = self.signer.sign(data).await?;

        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            cash_register_id: request.cash_register_id.clone(),
            receipt_number,
            payment_method: request.payment_method,
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
            signature_id: signed.record.id.clone(),
            created_at: signed.record.signed_at,
        };

        let lines: Vec<InvoiceLine> = request
            .lines
            .iter()
            .map(|line| InvoiceLine {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice.id.clone(),
                description: line.description.trim().to_string(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total().cents(),
                tax_bracket: line.tax_bracket,
                tax_cents: line.tax().cents(),
            })
            .collect();

        let ledger_payload = serde_json::to_string(&serde_json::json!({
            "receipt_number": invoice.receipt_number,
            "signature_counter": signed.record.signature_counter,
            "signature_value": signed.record.signature_value,
            "total_cents": invoice.total_cents,
        }))?;

        let mut tx = self.db.begin().await?;
        SignatureRepository::insert_tx(&mut *tx, &signed.record).await?;
        InvoiceRepository::insert_tx(&mut *tx, &invoice, &lines).await?;
        LedgerRepository::append_tx(&mut *tx, LedgerEntryKind::Receipt, &ledger_payload).await?;
        let submission =
            SubmissionRepository::enqueue_tx(&mut *tx, &invoice.id, signed.record.signed_at)
                .await?;
        tx.commit().await.map_err(kassa_db::DbError::from)?;

        info!(
            receipt_number = %invoice.receipt_number,
            total_cents = invoice.total_cents,
            counter = signed.record.signature_counter,
            "Issued signed invoice"
        );

        // Opportunistic immediate submission; deferral is never an error.
        let mut submitted = false;
        if self.status_rx.borrow().status.authority_reachable() {
            let payload = SubmissionPayload::from_invoice(
                &invoice,
                &lines,
                &signed.record.signature_value,
                &self.register.tax_number,
            );
            // The sale is already committed; nothing past this point may
            // fail it, so bookkeeping errors are logged, not propagated.
            match self.authority.submit_invoice(&payload).await {
                Ok(()) => match self.db.submissions().mark_submitted(&submission.id).await {
                    Ok(()) => submitted = true,
                    Err(e) => warn!(
                        submission_id = %submission.id,
                        error = %e,
                        "Failed to mark submission, queue will re-submit"
                    ),
                },
                Err(e) => {
                    warn!(
                        receipt_number = %invoice.receipt_number,
                        error = %e,
                        "Immediate submission failed, record stays pending"
                    );
                    if let Err(db_err) = self
                        .db
                        .submissions()
                        .mark_failed(&submission.id, &e.to_string())
                        .await
                    {
                        warn!(
                            submission_id = %submission.id,
                            error = %db_err,
                            "Failed to record submission error"
                        );
                    }
                }
            }
        }

        Ok(IssuedInvoice {
            invoice,
            lines,
            signature: signed.record,
            submitted,
        })
    }

    /// Signs a null receipt (Nullbeleg): proof the register was active with
    /// no transaction. Appends a DEP entry; no invoice is created.
    pub async fn sign_null_receipt(&self) -> FiscalResult<SignatureRecord> {
        let previous_signature = self.db.signatures().last_signature_value().await?;
        let turnover = self
            .db
            .invoices()
            .turnover_cents(&self.register.cash_register_id)
            .await?;

        let data = ProcessData {
            process_type: ProcessType::Nullbeleg,
            cash_register_id: self.register.cash_register_id.clone(),
            receipt_number: generate_receipt_number(&self.register.cash_register_id),
            timestamp: chrono::Utc::now(),
            bracket_amounts: [kassa_core::Money::zero(); 5],
            turnover_counter_cents: turnover,
            certificate_serial: self.register.certificate_serial.clone(),
            chain_value: chain_value(
                previous_signature.as_deref(),
                &self.register.cash_register_id,
            ),
        };

        let signed = self.signer.sign(data).await?;

        let ledger_payload = serde_json::to_string(&serde_json::json!({
            "receipt_number": signed.process_data.receipt_number,
            "signature_counter": signed.record.signature_counter,
            "signature_value": signed.record.signature_value,
        }))?;

        let mut tx = self.db.begin().await?;
        SignatureRepository::insert_tx(&mut *tx, &signed.record).await?;
        LedgerRepository::append_tx(&mut *tx, LedgerEntryKind::NullReceipt, &ledger_payload)
            .await?;
        tx.commit().await.map_err(kassa_db::DbError::from)?;

        info!(
            counter = signed.record.signature_counter,
            "Signed null receipt"
        );

        Ok(signed.record)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
