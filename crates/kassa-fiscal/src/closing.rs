//! # Closing Coordinator (Tagesabschluss)
//!
//! The closing state machine for daily, monthly, and yearly periods.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Closing State Machine (per register + period)              │
//! │                                                                         │
//! │   Idle ──► Aggregating ──► Signing ──► Persisted ──► Completed          │
//! │    │            │             │                                         │
//! │    │            │             └── signing error ──► Failed              │
//! │    │            │                 (nothing persisted; a later           │
//! │    │            │                  retry for the period is fine)        │
//! │    │            │                                                       │
//! │    │            └── zero invoices ──► NoActivity (no record, no         │
//! │    │                                  signature consumed)               │
//! │    │                                                                    │
//! │    └── completed record exists ──► AlreadyClosed (definitive "no",      │
//! │        never re-signed; ALSO enforced by the partial unique index,      │
//! │        so a racing second closing loses at COMMIT, not at the lookup)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use kassa_core::money::Money;
use kassa_core::receipt::{chain_value, ProcessData};
use kassa_core::request::{ClosingRequest, ClosingResponse};
use kassa_core::types::{
    ClosingPeriod, ClosingRecord, ClosingStatus, ClosingTotals, LedgerEntryKind, TaxBracket,
};
use kassa_db::{
    generate_receipt_number, ClosingRepository, Database, DbError, LedgerRepository,
    SignatureRepository,
};
use kassa_signing::TransactionSigner;

use crate::config::RegisterConfig;
use crate::error::FiscalResult;
use crate::queue::SubmissionQueueHandle;

// =============================================================================
// Closing Outcome
// =============================================================================

/// Business outcome of a closing request. "Already closed" and "no
/// activity" are ordinary outcomes, not errors; only device/db failures
/// surface as `FiscalError`.
#[derive(Debug, Clone)]
pub enum ClosingOutcome {
    /// A new closing was signed and persisted.
    Completed(Box<ClosingRecord>),
    /// A completed closing already exists for this period key.
    AlreadyClosed(Box<ClosingRecord>),
    /// The period contains no invoices; nothing was signed or persisted.
    NoActivity,
}

impl ClosingOutcome {
    /// Maps the outcome onto the operator-facing response shape.
    pub fn to_response(&self) -> ClosingResponse {
        match self {
            ClosingOutcome::Completed(record) => ClosingResponse {
                success: true,
                totals: Some(record.totals),
                signature_value: Some(record.signature.signature_value.clone()),
                error_message: None,
            },
            ClosingOutcome::AlreadyClosed(record) => ClosingResponse {
                success: false,
                totals: Some(record.totals),
                signature_value: Some(record.signature.signature_value.clone()),
                error_message: Some(format!(
                    "closing already performed for {} {} ({})",
                    record.cash_register_id, record.closing_date, record.period_type
                )),
            },
            ClosingOutcome::NoActivity => ClosingResponse {
                success: true,
                totals: None,
                signature_value: None,
                error_message: None,
            },
        }
    }
}

// =============================================================================
// Closing Coordinator
// =============================================================================

/// Aggregates, signs, and persists period closings.
pub struct ClosingCoordinator {
    db: Database,
    signer: Arc<TransactionSigner>,
    register: RegisterConfig,
    /// Optional hand-off target: a completed closing nudges the queue so
    /// pending records drain promptly. Failures here never invalidate the
    /// closing.
    queue: Option<SubmissionQueueHandle>,
}

impl ClosingCoordinator {
    /// Creates a coordinator.
    pub fn new(
        db: Database,
        signer: Arc<TransactionSigner>,
        register: RegisterConfig,
        queue: Option<SubmissionQueueHandle>,
    ) -> Self {
        ClosingCoordinator {
            db,
            signer,
            register,
            queue,
        }
    }

    /// Performs a closing for the requested period key.
    pub async fn perform_closing(&self, request: ClosingRequest) -> FiscalResult<ClosingOutcome> {
        let ClosingRequest {
            cash_register_id,
            closing_date,
            period_type,
        } = request;

        // Idle → Aggregating gate: short-circuit on an existing completed
        // record, never re-signing.
        if let Some(existing) = self
            .db
            .closings()
            .find_completed(&cash_register_id, closing_date, period_type)
            .await?
        {
            info!(
                register = %cash_register_id,
                date = %closing_date,
                period = %period_type,
                "Closing already performed"
            );
            return Ok(ClosingOutcome::AlreadyClosed(Box::new(existing)));
        }

        // Aggregating: sum all invoices of the period.
        let (from, to) = period_bounds(closing_date, period_type);
        let invoices = self
            .db
            .invoices()
            .list_in_period(&cash_register_id, from, to)
            .await?;

        if invoices.is_empty() {
            info!(
                register = %cash_register_id,
                date = %closing_date,
                period = %period_type,
                "No invoices in period, closing is a no-op"
            );
            return Ok(ClosingOutcome::NoActivity);
        }

        let mut totals = ClosingTotals::default();
        for invoice in &invoices {
            let lines = self.db.invoices().lines_for(&invoice.id).await?;
            totals.add_invoice(invoice, &lines);
        }

        info!(
            register = %cash_register_id,
            date = %closing_date,
            period = %period_type,
            invoices = invoices.len(),
            total_cents = totals.total_cents,
            "Aggregated closing totals"
        );

        // Signing: a failure aborts without persisting anything, so a later
        // retry for the same period key stays possible.
        let previous_signature = self.db.signatures().last_signature_value().await?;
        let turnover = self.db.invoices().turnover_cents(&cash_register_id).await?;

        let mut data = ProcessData {
            process_type: period_type.process_type(),
            cash_register_id: cash_register_id.clone(),
            receipt_number: generate_receipt_number(&cash_register_id),
            timestamp: Utc::now(), // replaced by the signer
            bracket_amounts: [Money::zero(); 5],
            turnover_counter_cents: turnover,
            certificate_serial: self.register.certificate_serial.clone(),
            chain_value: chain_value(previous_signature.as_deref(), &cash_register_id),
        };
        for bracket in TaxBracket::ALL {
            let bucket = totals.tax_breakdown.bucket(bracket);
            data.set_amount(bracket, Money::from_cents(bucket.net_cents + bucket.tax_cents));
        }

        let signed = self.signer.sign(data).await?;

        // Persisted: closing record + DEP entry in one transaction. The
        // partial unique index resolves check-then-act races definitively.
        let record = ClosingRecord {
            id: Uuid::new_v4().to_string(),
            cash_register_id: cash_register_id.clone(),
            closing_date,
            period_type,
            totals,
            invoice_count: invoices.len() as i64,
            signature: signed.record,
            status: ClosingStatus::Completed,
            created_at: Utc::now(),
        };

        let ledger_payload = serde_json::to_string(&serde_json::json!({
            "closing_id": record.id,
            "period_type": record.period_type,
            "closing_date": record.closing_date,
            "total_cents": record.totals.total_cents,
            "tax_cents": record.totals.tax_cents,
            "invoice_count": record.invoice_count,
            "signature_value": record.signature.signature_value,
        }))?;

        let mut tx = self.db.begin().await?;
        SignatureRepository::insert_tx(&mut *tx, &record.signature).await?;
        let insert_result = ClosingRepository::insert_tx(&mut *tx, &record).await;
        match insert_result {
            Ok(()) => {}
            Err(DbError::UniqueViolation(_)) => {
                // Lost a race: someone completed this period between our
                // lookup and our commit. Roll back and report the winner.
                drop(tx);
                warn!(
                    register = %cash_register_id,
                    date = %closing_date,
                    period = %period_type,
                    "Concurrent closing won the period key"
                );
                let winner = self
                    .db
                    .closings()
                    .find_completed(&cash_register_id, closing_date, period_type)
                    .await?
                    .ok_or_else(|| DbError::NotFound {
                        entity: "closing".to_string(),
                        id: format!("{cash_register_id}/{closing_date}/{period_type}"),
                    })?;
                return Ok(ClosingOutcome::AlreadyClosed(Box::new(winner)));
            }
            Err(e) => return Err(e.into()),
        }
        LedgerRepository::append_tx(&mut *tx, LedgerEntryKind::Closing, &ledger_payload).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            closing_id = %record.id,
            register = %cash_register_id,
            period = %period_type,
            counter = record.signature.signature_counter,
            "Closing completed"
        );

        // Hand-off: nudge the submission queue. Best-effort only.
        if let Some(queue) = &self.queue {
            if let Err(e) = queue.cycle_now().await {
                warn!(error = %e, "Queue nudge after closing failed");
            }
        }

        Ok(ClosingOutcome::Completed(Box::new(record)))
    }
}

// =============================================================================
// Period Bounds
// =============================================================================

/// Half-open UTC bounds `[from, to)` of a closing period.
fn period_bounds(
    date: NaiveDate,
    period: ClosingPeriod,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let (start, end) = match period {
        ClosingPeriod::Daily => (date, date.succ_opt().expect("valid next day")),
        ClosingPeriod::Monthly => {
            let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .expect("valid month start");
            let end = if date.month() == 12 {
                NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
            }
            .expect("valid next month");
            (start, end)
        }
        ClosingPeriod::Yearly => (
            NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("valid year start"),
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).expect("valid next year"),
        ),
    };

    (
        Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).expect("midnight")),
        Utc.from_utc_datetime(&end.and_hms_opt(0, 0, 0).expect("midnight")),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FiscalError;
    use crate::testsupport::Fixture;
    use kassa_core::types::{NetworkStatus, ProcessType};
    use kassa_signing::{SigningDevice, SigningError, SoftwareSigningDevice};
    use tokio::sync::Mutex;

    fn coordinator(fixture: &Fixture) -> ClosingCoordinator {
        ClosingCoordinator::new(
            fixture.db.clone(),
            Arc::clone(&fixture.signer),
            fixture.register.clone(),
            Some(fixture.queue.clone()),
        )
    }

    fn todays_request(fixture: &Fixture) -> ClosingRequest {
        ClosingRequest {
            cash_register_id: fixture.register.cash_register_id.clone(),
            closing_date: Utc::now().date_naive(),
            period_type: ClosingPeriod::Daily,
        }
    }

    #[tokio::test]
    async fn test_daily_closing_aggregates_and_signs() {
        let fixture = Fixture::new(NetworkStatus::Disconnected).await;
        let coordinator = coordinator(&fixture);

        fixture
            .service
            .create_invoice(fixture.standard_sale())
            .await
            .unwrap();
        fixture
            .service
            .create_invoice(fixture.standard_sale())
            .await
            .unwrap();

        let outcome = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap();

        let ClosingOutcome::Completed(record) = outcome else {
            panic!("expected completed closing");
        };
        assert_eq!(record.invoice_count, 2);
        assert_eq!(record.totals.total_cents, 24000);
        assert_eq!(record.totals.tax_cents, 4000);
        assert_eq!(record.totals.tax_breakdown.standard.net_cents, 20000);
        assert_eq!(record.totals.payment_breakdown.cash_cents, 24000);
        assert_eq!(
            record.signature.process_type,
            ProcessType::DailyReport
        );

        // Two receipts + one closing in the DEP.
        assert_eq!(fixture.db.ledger().count().await.unwrap(), 3);
    }

    /// Idempotence: the second closing for the same period key is a
    /// definitive rejection and consumes no signature.
    #[tokio::test]
    async fn test_second_closing_is_rejected_without_signing() {
        let fixture = Fixture::new(NetworkStatus::Disconnected).await;
        let coordinator = coordinator(&fixture);

        fixture
            .service
            .create_invoice(fixture.standard_sale())
            .await
            .unwrap();

        let first = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap();
        let ClosingOutcome::Completed(first_record) = first else {
            panic!("expected completed closing");
        };

        let counter_before = {
            let device = fixture.signer.device();
            let guard = device.lock().await;
            guard.status().signature_counter
        };

        let second = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap();
        let ClosingOutcome::AlreadyClosed(existing) = second else {
            panic!("expected already-closed outcome");
        };
        assert_eq!(existing.id, first_record.id);

        let counter_after = {
            let device = fixture.signer.device();
            let guard = device.lock().await;
            guard.status().signature_counter
        };
        assert_eq!(counter_before, counter_after);
    }

    /// Scenario C: a period with zero invoices is a no-op, not an error,
    /// and consumes no signature.
    #[tokio::test]
    async fn test_empty_period_is_a_noop() {
        let fixture = Fixture::new(NetworkStatus::Disconnected).await;
        let coordinator = coordinator(&fixture);

        let outcome = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap();
        assert!(matches!(outcome, ClosingOutcome::NoActivity));

        let device = fixture.signer.device();
        assert_eq!(device.lock().await.status().signature_counter, 0);
        assert_eq!(fixture.db.ledger().count().await.unwrap(), 0);
    }

    /// A signing failure persists nothing, so a later retry for the same
    /// period succeeds.
    #[tokio::test]
    async fn test_signing_failure_leaves_period_retryable() {
        let fixture = Fixture::new(NetworkStatus::Disconnected).await;
        fixture
            .service
            .create_invoice(fixture.standard_sale())
            .await
            .unwrap();

        let mut broken = SoftwareSigningDevice::new("SW-TSE-DEAD");
        broken.set_transport_fault(Some("bus gone".into()));
        let failing = ClosingCoordinator::new(
            fixture.db.clone(),
            Arc::new(kassa_signing::TransactionSigner::new(Arc::new(Mutex::new(
                Box::new(broken),
            )))),
            fixture.register.clone(),
            None,
        );

        let err = failing.perform_closing(todays_request(&fixture)).await;
        assert!(matches!(
            err,
            Err(FiscalError::Signing(SigningError::DeviceUnavailable(_)))
        ));

        // Retry with the healthy device completes.
        let outcome = coordinator(&fixture)
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap();
        assert!(matches!(outcome, ClosingOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_response_mapping() {
        let fixture = Fixture::new(NetworkStatus::Disconnected).await;
        let coordinator = coordinator(&fixture);

        let noop = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap()
            .to_response();
        assert!(noop.success);
        assert!(noop.totals.is_none());
        assert!(noop.signature_value.is_none());

        fixture
            .service
            .create_invoice(fixture.standard_sale())
            .await
            .unwrap();

        let completed = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap()
            .to_response();
        assert!(completed.success);
        assert_eq!(completed.totals.unwrap().total_cents, 12000);
        assert!(completed.signature_value.is_some());

        let rejected = coordinator
            .perform_closing(todays_request(&fixture))
            .await
            .unwrap()
            .to_response();
        assert!(!rejected.success);
        assert!(rejected
            .error_message
            .unwrap()
            .contains("already performed"));
    }

    #[test]
    fn test_period_bounds_daily() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (from, to) = period_bounds(date, ClosingPeriod::Daily);
        assert_eq!(from.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2026-03-02T00:00:00+00:00");
    }

    #[test]
    fn test_period_bounds_monthly_rollover() {
        let date = NaiveDate::from_ymd_opt(2026, 12, 15).unwrap();
        let (from, to) = period_bounds(date, ClosingPeriod::Monthly);
        assert_eq!(from.to_rfc3339(), "2026-12-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2027-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_period_bounds_yearly() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        let (from, to) = period_bounds(date, ClosingPeriod::Yearly);
        assert_eq!(from.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2027-01-01T00:00:00+00:00");
    }
}
