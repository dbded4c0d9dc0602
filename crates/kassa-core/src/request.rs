//! Request/response shapes exchanged with the host application.
//!
//! These are the §6-style boundary types: what the POS layer hands to the
//! signing core, and what it gets back. They carry no behavior beyond
//! convenience accessors; validation lives in [`crate::validation`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{ClosingPeriod, ClosingTotals, PaymentMethod, TaxBracket};

// =============================================================================
// Invoice Request
// =============================================================================

/// A line item of a sale about to be signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_bracket: TaxBracket,
}

impl NewInvoiceLine {
    /// Net line total (unit price × quantity).
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    /// Tax for this line at the bracket's statutory rate.
    pub fn tax(&self) -> Money {
        self.line_total().calculate_tax(self.tax_bracket.rate())
    }
}

/// A sale the host application wants signed and issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub cash_register_id: String,
    pub payment_method: PaymentMethod,
    pub lines: Vec<NewInvoiceLine>,
}

impl InvoiceRequest {
    /// Net subtotal over all lines.
    pub fn subtotal(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |acc, l| acc + l.line_total())
    }

    /// Total tax over all lines.
    pub fn tax(&self) -> Money {
        self.lines.iter().fold(Money::zero(), |acc, l| acc + l.tax())
    }

    /// Gross total (subtotal + tax).
    pub fn total(&self) -> Money {
        self.subtotal() + self.tax()
    }

    /// Gross amount per tax bucket, in canonical bucket order.
    pub fn bracket_amounts(&self) -> [Money; 5] {
        let mut amounts = [Money::zero(); 5];
        for line in &self.lines {
            let idx = TaxBracket::ALL
                .iter()
                .position(|b| *b == line.tax_bracket)
                .expect("bracket is always in ALL");
            amounts[idx] += line.line_total() + line.tax();
        }
        amounts
    }
}

// =============================================================================
// Closing Request / Response
// =============================================================================

/// A closing request for one register and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingRequest {
    pub cash_register_id: String,
    pub closing_date: NaiveDate,
    pub period_type: ClosingPeriod,
}

/// The operator-facing result of a closing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingResponse {
    pub success: bool,
    pub totals: Option<ClosingTotals>,
    pub signature_value: Option<String>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InvoiceRequest {
        InvoiceRequest {
            cash_register_id: "AT-REG-001".into(),
            payment_method: PaymentMethod::Cash,
            lines: vec![
                NewInvoiceLine {
                    description: "Espresso".into(),
                    quantity: 2,
                    unit_price_cents: 250,
                    tax_bracket: TaxBracket::Reduced1,
                },
                NewInvoiceLine {
                    description: "Zeitung".into(),
                    quantity: 1,
                    unit_price_cents: 300,
                    tax_bracket: TaxBracket::Reduced1,
                },
            ],
        }
    }

    #[test]
    fn test_request_totals() {
        let req = request();
        assert_eq!(req.subtotal().cents(), 800);
        // 8,00 € at 10% = 0,80 €
        assert_eq!(req.tax().cents(), 80);
        assert_eq!(req.total().cents(), 880);
    }

    #[test]
    fn test_bracket_amounts_are_gross() {
        let amounts = request().bracket_amounts();
        // Reduced1 is index 1 in canonical order
        assert_eq!(amounts[1].cents(), 880);
        assert_eq!(amounts[0].cents(), 0);
    }
}
