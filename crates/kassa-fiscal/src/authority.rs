//! # Tax Authority Client
//!
//! The FinanzOnline submission interface: the payload shape the portal
//! accepts and the HTTP client that delivers it.
//!
//! The full portal wire protocol is out of scope; this module owns only the
//! shape of the data exchanged and the delivery call. Components depend on
//! the [`AuthorityClient`] trait, so tests (and a future SOAP-speaking
//! client) slot in without touching the queue or the invoice service.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kassa_core::types::{Invoice, InvoiceLine, TaxBreakdown};

use crate::config::AuthorityConfig;
use crate::error::{FiscalError, FiscalResult};

// =============================================================================
// Submission Payload
// =============================================================================

/// One line item as submitted to the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionLineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub tax_bracket: kassa_core::types::TaxBracket,
    pub tax_cents: i64,
}

/// Totals block of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// The invoice submission payload expected by the tax portal (camelCase on
/// the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub invoice_number: String,
    pub invoice_date: DateTime<Utc>,
    pub tax_number: String,
    pub signature_value: String,
    pub cash_register_id: String,
    pub line_items: Vec<SubmissionLineItem>,
    pub totals: SubmissionTotals,
    pub tax_breakdown: TaxBreakdown,
}

impl SubmissionPayload {
    /// Assembles a payload from a signed invoice and its lines.
    pub fn from_invoice(
        invoice: &Invoice,
        lines: &[InvoiceLine],
        signature_value: &str,
        tax_number: &str,
    ) -> Self {
        let mut tax_breakdown = TaxBreakdown::default();
        let line_items = lines
            .iter()
            .map(|line| {
                let bucket = tax_breakdown.bucket_mut(line.tax_bracket);
                bucket.net_cents += line.line_total_cents;
                bucket.tax_cents += line.tax_cents;

                SubmissionLineItem {
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                    line_total_cents: line.line_total_cents,
                    tax_bracket: line.tax_bracket,
                    tax_cents: line.tax_cents,
                }
            })
            .collect();

        SubmissionPayload {
            invoice_number: invoice.receipt_number.clone(),
            invoice_date: invoice.created_at,
            tax_number: tax_number.to_string(),
            signature_value: signature_value.to_string(),
            cash_register_id: invoice.cash_register_id.clone(),
            line_items,
            totals: SubmissionTotals {
                subtotal_cents: invoice.subtotal_cents,
                tax_cents: invoice.tax_cents,
                total_cents: invoice.total_cents,
            },
            tax_breakdown,
        }
    }
}

// =============================================================================
// Authority Client Trait
// =============================================================================

/// Delivery seam towards the tax portal.
pub trait AuthorityClient: Send + Sync + 'static {
    /// Submits one signed invoice. `Ok(())` means the authority accepted
    /// the record; any error leaves the submission pending for retry.
    fn submit_invoice(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = FiscalResult<()>> + Send;

    /// Cheap reachability check of the portal endpoint. Used by the network
    /// monitor; never used to gate local signing.
    fn check_reachable(&self) -> impl Future<Output = bool> + Send;
}

// =============================================================================
// FinanzOnline Client
// =============================================================================

/// HTTP client for the FinanzOnline register database endpoint.
#[derive(Debug, Clone)]
pub struct FinanzOnlineClient {
    http: reqwest::Client,
    submit_url: String,
    probe_url: String,
}

impl FinanzOnlineClient {
    /// Creates a client from authority configuration.
    pub fn new(config: &AuthorityConfig) -> FiscalResult<Self> {
        let base = url::Url::parse(&config.base_url)
            .map_err(|e| FiscalError::InvalidConfig(format!("authority.base_url: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.submit_timeout_secs))
            .build()
            .map_err(|e| FiscalError::InvalidConfig(e.to_string()))?;

        Ok(FinanzOnlineClient {
            http,
            submit_url: format!("{}/rkdb/receipts", base.as_str().trim_end_matches('/')),
            probe_url: base.to_string(),
        })
    }
}

impl AuthorityClient for FinanzOnlineClient {
    async fn submit_invoice(&self, payload: &SubmissionPayload) -> FiscalResult<()> {
        debug!(
            invoice_number = %payload.invoice_number,
            register = %payload.cash_register_id,
            "Submitting invoice to FinanzOnline"
        );

        let response = self.http.post(&self.submit_url).json(payload).send().await?;

        if response.status().is_success() {
            info!(
                invoice_number = %payload.invoice_number,
                "Authority accepted submission"
            );
            Ok(())
        } else {
            Err(FiscalError::AuthorityRejected(format!(
                "HTTP {} for invoice {}",
                response.status(),
                payload.invoice_number
            )))
        }
    }

    async fn check_reachable(&self) -> bool {
        match self.http.get(&self.probe_url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(_) => false,
        }
    }
}

// =============================================================================
// Test Double
// =============================================================================


// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kassa_core::types::{PaymentMethod, TaxBracket};

    fn invoice_with_lines() -> (Invoice, Vec<InvoiceLine>) {
        let invoice = Invoice {
            id: "inv-1".into(),
            cash_register_id: "AT-REG-001".into(),
            receipt_number: "20260301-01-0001".into(),
            payment_method: PaymentMethod::Card,
            subtotal_cents: 10000,
            tax_cents: 2000,
            total_cents: 12000,
            signature_id: "sig-1".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        };
        let lines = vec![InvoiceLine {
            id: "line-1".into(),
            invoice_id: "inv-1".into(),
            description: "Espresso".into(),
            quantity: 4,
            unit_price_cents: 2500,
            line_total_cents: 10000,
            tax_bracket: TaxBracket::Standard,
            tax_cents: 2000,
        }];
        (invoice, lines)
    }

    #[test]
    fn test_payload_assembly() {
        let (invoice, lines) = invoice_with_lines();
        let payload =
            SubmissionPayload::from_invoice(&invoice, &lines, "ey.payload.sig", "912345678");

        assert_eq!(payload.invoice_number, "20260301-01-0001");
        assert_eq!(payload.tax_number, "912345678");
        assert_eq!(payload.signature_value, "ey.payload.sig");
        assert_eq!(payload.totals.total_cents, 12000);
        assert_eq!(payload.line_items.len(), 1);
        assert_eq!(payload.tax_breakdown.standard.net_cents, 10000);
        assert_eq!(payload.tax_breakdown.standard.tax_cents, 2000);
    }

    #[test]
    fn test_client_url_assembly() {
        let config = AuthorityConfig {
            base_url: "https://portal.example.at/fon/".into(),
            submit_timeout_secs: 5,
        };
        let client = FinanzOnlineClient::new(&config).unwrap();
        assert_eq!(
            client.submit_url,
            "https://portal.example.at/fon/rkdb/receipts"
        );
    }
}
