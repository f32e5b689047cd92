//! Pre-submission checks. Every unmet rule adds one message; nothing
//! short-circuits, so the client sees all problems at once.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{InvoiceKind, InvoiceRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

pub fn validate_invoice(invoice: &InvoiceRecord) -> ValidationReport {
    let mut errors = Vec::new();

    if !invoice.number.is_some_and(|n| n > 0) {
        errors.push("Invalid invoice number".to_string());
    }

    if invoice.issue_date.is_none() {
        errors.push("Invoice date is required".to_string());
    }

    if invoice.customer_name.is_empty() {
        errors.push("Customer name is required".to_string());
    }

    if invoice.kind == InvoiceKind::Standard && invoice.customer_vat.is_none() {
        errors.push("VAT number is required".to_string());
    }

    // An overflowing subtotal is reported against its line or the totals below.
    let total_ok = match invoice.declared_total {
        Some(total) => total > Decimal::ZERO,
        None => invoice
            .checked_subtotal()
            .and_then(|subtotal| subtotal.checked_sub(invoice.discount))
            .map_or(true, |net| net > Decimal::ZERO),
    };
    if !total_ok {
        errors.push("Invalid total amount".to_string());
    }

    if invoice.declared_tax.is_some_and(|tax| tax < Decimal::ZERO) {
        errors.push("Invalid VAT amount".to_string());
    }

    if invoice.tax_rate < Decimal::ZERO || invoice.tax_rate > Decimal::ONE {
        errors.push("Invalid tax rate".to_string());
    }

    if invoice.items.is_empty() {
        errors.push("Invoice must have at least one item".to_string());
    }

    let mut lines_in_range = true;
    for (index, item) in invoice.items.iter().enumerate() {
        if item.quantity <= Decimal::ZERO || item.unit_price < Decimal::ZERO {
            errors.push(format!(
                "Line item {} has an invalid quantity or price",
                index + 1
            ));
        } else if item.checked_line_amount().is_none() {
            lines_in_range = false;
            errors.push(format!("Line item {} amount is out of range", index + 1));
        }
    }

    if lines_in_range && invoice.checked_totals().is_none() {
        errors.push("Invoice totals are out of range".to_string());
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}
