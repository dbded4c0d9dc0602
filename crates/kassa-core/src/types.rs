//! # Domain Types
//!
//! Core domain types of the RKSV signing core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Fiscal Domain Types                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │    Invoice      │   │ SignatureRecord  │   │  ClosingRecord   │     │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────  │     │
//! │  │  id (UUID)      │   │  signature_value │   │  closing_date    │     │
//! │  │  receipt_number │   │  counter         │   │  period_type     │     │
//! │  │  total_cents    │   │  device_serial   │   │  totals          │     │
//! │  │  signature_id ──┼──►│  process_type    │◄──┼─ signature       │     │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────┘     │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌────────────────────┐                     │
//! │  │ ComplianceLedgerEntry│   │ PendingSubmission  │                     │
//! │  │  (DEP, append-only)  │   │  (FinanzOnline     │                     │
//! │  │  seq, kind, payload  │   │   outbox record)   │                     │
//! │  └──────────────────────┘   └────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No invoice and no closing exists without its `SignatureRecord`: the
//! foreign keys in kassa-db are NOT NULL, so the invariant is structural.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000. 2000 bps = the Austrian 20% standard rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax Bracket
// =============================================================================

/// The Austrian RKSV tax buckets. The machine-readable receipt code carries
/// one amount per bucket, in this exact order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TaxBracket {
    /// Satz-Normal: 20%.
    Standard,
    /// Satz-Ermaessigt-1: 10% (food, books, rent).
    Reduced1,
    /// Satz-Ermaessigt-2: 13% (cultural events, domestic flights).
    Reduced2,
    /// Satz-Besonders: 19% (Jungholz/Mittelberg border regions).
    Special,
    /// Satz-Null: 0% (exempt supplies).
    Zero,
}

impl TaxBracket {
    /// All brackets in canonical receipt order.
    pub const ALL: [TaxBracket; 5] = [
        TaxBracket::Standard,
        TaxBracket::Reduced1,
        TaxBracket::Reduced2,
        TaxBracket::Special,
        TaxBracket::Zero,
    ];

    /// The statutory rate for this bracket.
    pub const fn rate(&self) -> TaxRate {
        match self {
            TaxBracket::Standard => TaxRate::from_bps(2000),
            TaxBracket::Reduced1 => TaxRate::from_bps(1000),
            TaxBracket::Reduced2 => TaxRate::from_bps(1300),
            TaxBracket::Special => TaxRate::from_bps(1900),
            TaxBracket::Zero => TaxRate::from_bps(0),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Voucher redemption.
    Voucher,
}

// =============================================================================
// Process Type
// =============================================================================

/// The RKSV process type tag carried in every signature.
///
/// Distinguishes what kind of fiscal event the security device signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    /// A regular sale receipt.
    Sign,
    /// Daily closing (Tagesabschluss).
    DailyReport,
    /// Monthly closing (Monatsabschluss).
    MonthlyReport,
    /// Yearly closing (Jahresabschluss).
    YearlyReport,
    /// Null receipt proving the register was active with no transaction.
    Nullbeleg,
}

impl ProcessType {
    /// The tag embedded in the canonical receipt string.
    pub const fn tag(&self) -> &'static str {
        match self {
            ProcessType::Sign => "BELEG",
            ProcessType::DailyReport => "TAGESABSCHLUSS",
            ProcessType::MonthlyReport => "MONATSABSCHLUSS",
            ProcessType::YearlyReport => "JAHRESABSCHLUSS",
            ProcessType::Nullbeleg => "NULLBELEG",
        }
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// =============================================================================
// Signature Record
// =============================================================================

/// The result of one signing action. Immutable once created; owned by the
/// invoice, closing, or null receipt it signs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SignatureRecord {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Compact signature: `base64url(header).base64url(payload).base64url(sig)`.
    pub signature_value: String,

    /// Device-scoped monotonic counter, read after signing.
    pub signature_counter: i64,

    /// Serial number of the device that produced the signature.
    pub device_serial: String,

    /// What kind of fiscal event was signed.
    pub process_type: ProcessType,

    /// Server timestamp of the signing call.
    pub signed_at: DateTime<Utc>,
}

// =============================================================================
// Invoice
// =============================================================================

/// A signed sale. An invoice row never exists without its signature record
/// (NOT NULL foreign key); signing failure aborts the whole sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub cash_register_id: String,
    pub receipt_number: String,
    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Signature that legally issued this invoice.
    pub signature_id: String,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Returns the gross total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the tax portion as Money.
    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }
}

/// A line item on an invoice. Snapshot data, frozen at signing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Net line total (unit_price × quantity).
    pub line_total_cents: i64,
    pub tax_bracket: TaxBracket,
    pub tax_cents: i64,
}

impl InvoiceLine {
    /// Returns the net line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Closing (Tagesabschluss)
// =============================================================================

/// The closing period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ClosingPeriod {
    Daily,
    Monthly,
    Yearly,
}

impl ClosingPeriod {
    /// The process type a closing of this period is signed with.
    pub const fn process_type(&self) -> ProcessType {
        match self {
            ClosingPeriod::Daily => ProcessType::DailyReport,
            ClosingPeriod::Monthly => ProcessType::MonthlyReport,
            ClosingPeriod::Yearly => ProcessType::YearlyReport,
        }
    }
}

impl std::fmt::Display for ClosingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosingPeriod::Daily => write!(f, "daily"),
            ClosingPeriod::Monthly => write!(f, "monthly"),
            ClosingPeriod::Yearly => write!(f, "yearly"),
        }
    }
}

/// Terminal state of a closing attempt. Failed closings persist no record
/// and therefore never block a later retry for the same period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ClosingStatus {
    Completed,
    Failed,
}

/// Net/tax pair for one tax bracket inside a closing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketTotal {
    pub net_cents: i64,
    pub tax_cents: i64,
}

/// Per-bracket breakdown of a closing, all five RKSV buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub standard: BracketTotal,
    pub reduced1: BracketTotal,
    pub reduced2: BracketTotal,
    pub special: BracketTotal,
    pub zero: BracketTotal,
}

impl TaxBreakdown {
    /// Mutable access to one bucket.
    pub fn bucket_mut(&mut self, bracket: TaxBracket) -> &mut BracketTotal {
        match bracket {
            TaxBracket::Standard => &mut self.standard,
            TaxBracket::Reduced1 => &mut self.reduced1,
            TaxBracket::Reduced2 => &mut self.reduced2,
            TaxBracket::Special => &mut self.special,
            TaxBracket::Zero => &mut self.zero,
        }
    }

    /// Read access to one bucket.
    pub fn bucket(&self, bracket: TaxBracket) -> BracketTotal {
        match bracket {
            TaxBracket::Standard => self.standard,
            TaxBracket::Reduced1 => self.reduced1,
            TaxBracket::Reduced2 => self.reduced2,
            TaxBracket::Special => self.special,
            TaxBracket::Zero => self.zero,
        }
    }
}

/// Per-payment-method breakdown of a closing (gross amounts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub cash_cents: i64,
    pub card_cents: i64,
    pub voucher_cents: i64,
}

impl PaymentBreakdown {
    /// Adds a gross amount under the given method.
    pub fn add(&mut self, method: PaymentMethod, gross_cents: i64) {
        match method {
            PaymentMethod::Cash => self.cash_cents += gross_cents,
            PaymentMethod::Card => self.card_cents += gross_cents,
            PaymentMethod::Voucher => self.voucher_cents += gross_cents,
        }
    }
}

/// Aggregated totals of one closing period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingTotals {
    /// Gross total over all invoices in the period.
    pub total_cents: i64,
    /// Total tax over all invoices in the period.
    pub tax_cents: i64,
    pub tax_breakdown: TaxBreakdown,
    pub payment_breakdown: PaymentBreakdown,
}

impl ClosingTotals {
    /// Folds one invoice (with its lines) into the running totals.
    pub fn add_invoice(&mut self, invoice: &Invoice, lines: &[InvoiceLine]) {
        self.total_cents += invoice.total_cents;
        self.tax_cents += invoice.tax_cents;
        self.payment_breakdown
            .add(invoice.payment_method, invoice.total_cents);

        for line in lines {
            let bucket = self.tax_breakdown.bucket_mut(line.tax_bracket);
            bucket.net_cents += line.line_total_cents;
            bucket.tax_cents += line.tax_cents;
        }
    }

    /// Count of invoices is tracked by the caller; totals stay pure sums.
    pub fn is_empty(&self) -> bool {
        *self == ClosingTotals::default()
    }
}

/// A signed closing for one (register, date, period) key. At most one
/// Completed record exists per key; kassa-db enforces this with a partial
/// unique index, not a check-then-act lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingRecord {
    pub id: String,
    pub cash_register_id: String,
    pub closing_date: NaiveDate,
    pub period_type: ClosingPeriod,
    pub totals: ClosingTotals,
    /// Count of invoices aggregated into this closing.
    pub invoice_count: i64,
    pub signature: SignatureRecord,
    pub status: ClosingStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Compliance Ledger (DEP)
// =============================================================================

/// What kind of fiscal event a DEP entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// A signed sale receipt.
    Receipt,
    /// A signed closing.
    Closing,
    /// A signed null receipt.
    NullReceipt,
    /// An operator-relevant audit event (archival, export, device change).
    Audit,
}

/// One entry of the append-only DEP / audit trail.
///
/// Entries are never updated or deleted; `seq` is the insertion sequence
/// breaking timestamp ties on export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ComplianceLedgerEntry {
    pub id: String,
    /// Insertion sequence, assigned by the database.
    pub seq: i64,
    pub kind: LedgerEntryKind,
    /// JSON payload describing the event.
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Pending Submission (FinanzOnline outbox)
// =============================================================================

/// Lifecycle of a pending authority submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    /// Signed locally, not yet accepted by the authority.
    Pending,
    /// Accepted by the authority.
    Submitted,
    /// Archived after the retention window without submission.
    Cancelled,
}

/// An invoice that is signed locally but not yet accepted by the tax
/// authority. Its existence implies a valid SignatureRecord already exists:
/// remote submission is deferred, local signing never is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PendingSubmission {
    pub id: String,
    pub invoice_id: String,
    /// When the underlying invoice was signed.
    pub signed_at: DateTime<Utc>,
    pub state: SubmissionState,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Error recorded by the most recent failed attempt.
    pub last_error: Option<String>,
    /// Number of submission attempts so far.
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Network Status
// =============================================================================

/// Computed connectivity level, recomputed periodically by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// No internet reachability at all.
    Disconnected,
    /// Internet reachable, tax portal not.
    InternetOnly,
    /// Internet and tax portal both reachable.
    FullyConnected,
}

impl NetworkStatus {
    /// Whether remote submission is worth attempting right now.
    pub const fn authority_reachable(&self) -> bool {
        matches!(self, NetworkStatus::FullyConnected)
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkStatus::Disconnected => write!(f, "disconnected"),
            NetworkStatus::InternetOnly => write!(f, "internet_only"),
            NetworkStatus::FullyConnected => write!(f, "fully_connected"),
        }
    }
}

/// An immutable snapshot published by the network monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub status: NetworkStatus,
    pub last_checked: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
