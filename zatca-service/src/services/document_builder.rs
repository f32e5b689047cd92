//! Turns a normalized invoice into a canonical UBL 2.1 document.
//!
//! Missing seller details fall back to fixed placeholders so the document
//! stays schema-shaped; the validator is responsible for rejecting invoices
//! that are missing data ZATCA actually requires.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CanonicalDocument, InvoiceRecord, LineItem, MonetaryTotals};
use crate::services::qr::{encode_tlv, QrFields};
use crate::services::ubl;

const PLACEHOLDER_TAX_ID: &str = "000000000000000";
const PLACEHOLDER_COMPANY: &str = "Company Name";
const PLACEHOLDER_STREET: &str = "Street Address";
const PLACEHOLDER_CITY: &str = "City";
const PLACEHOLDER_POSTAL: &str = "00000";
const COUNTRY: &str = "SA";

const INVOICE_TYPE_CODE: &str = "388";
const TAX_CATEGORY: &str = "S";
const TAX_SCHEME: &str = "VAT";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to serialize invoice document: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder;

impl DocumentBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the document. Every call mints a new UUID, so building the same
    /// invoice twice yields two distinct documents with identical amounts.
    pub fn build(
        &self,
        invoice: &InvoiceRecord,
        invoice_hash: &str,
    ) -> Result<CanonicalDocument, DocumentError> {
        let uuid = Uuid::new_v4();
        let issued_at = parse_issue_datetime(invoice.issue_date.as_deref());
        let currency = invoice.currency.clone();
        let percent = invoice.tax_rate_percent().to_string();

        let totals = MonetaryTotals {
            currency: currency.clone(),
            line_extension: money(invoice.line_subtotal()),
            allowance: money(invoice.discount),
            tax_exclusive: money(invoice.taxable_amount()),
            tax: money(invoice.tax_amount()),
            tax_inclusive: money(invoice.total()),
        };

        let seller = &invoice.seller;
        let seller_name = seller.name.as_deref().unwrap_or(PLACEHOLDER_COMPANY);
        let seller_vat = seller.vat_number.as_deref().unwrap_or(PLACEHOLDER_TAX_ID);

        let supplier = party(
            seller_vat,
            seller_name,
            seller.street.as_deref(),
            seller.city.as_deref(),
            seller.postal_code.as_deref(),
        );
        let customer = party(
            invoice.customer_vat.as_deref().unwrap_or(PLACEHOLDER_TAX_ID),
            &invoice.customer_name,
            None,
            None,
            None,
        );

        let amount = |value: Decimal| ubl::Amount {
            currency_id: currency.clone(),
            value: format_money(value),
        };

        let lines = invoice
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| invoice_line(index + 1, item, invoice.tax_rate, &percent, &amount))
            .collect::<Vec<_>>();

        let document = ubl::Invoice {
            xmlns: ubl::NS_INVOICE,
            xmlns_cac: ubl::NS_CAC,
            xmlns_cbc: ubl::NS_CBC,
            ubl_version_id: "2.1",
            profile_id: "reporting:1.0",
            id: invoice.number.map(|n| n.to_string()).unwrap_or_default(),
            copy_indicator: false,
            uuid: uuid.to_string(),
            issue_date: issued_at.format("%Y-%m-%d").to_string(),
            issue_time: issued_at.format("%H:%M:%S").to_string(),
            invoice_type_code: ubl::InvoiceTypeCode {
                name: invoice.kind.transaction_code(),
                code: INVOICE_TYPE_CODE,
            },
            document_currency_code: currency.clone(),
            tax_currency_code: currency.clone(),
            line_count_numeric: lines.len(),
            additional_document_reference: ubl::AdditionalDocumentReference {
                id: "InvoiceHash",
                attachment: ubl::Attachment {
                    embedded: ubl::EmbeddedObject {
                        mime_code: "text/plain",
                        value: invoice_hash.to_string(),
                    },
                },
            },
            accounting_supplier_party: ubl::PartyWrapper { party: supplier },
            accounting_customer_party: ubl::PartyWrapper { party: customer },
            payment_means: ubl::PaymentMeans { id: "1", code: "1" },
            tax_total: tax_total(totals.tax_exclusive, totals.tax, &percent, &amount),
            legal_monetary_total: ubl::LegalMonetaryTotal {
                line_extension_amount: amount(totals.line_extension),
                tax_exclusive_amount: amount(totals.tax_exclusive),
                tax_inclusive_amount: amount(totals.tax_inclusive),
                allowance_total_amount: amount(totals.allowance),
                payable_amount: amount(totals.tax_inclusive),
            },
            invoice_lines: lines,
        };

        let xml = document.to_xml().map_err(DocumentError::Serialize)?;

        let timestamp = issued_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let total_text = format_money(totals.tax_inclusive);
        let tax_text = format_money(totals.tax);
        let qr_code = encode_tlv(&QrFields {
            seller_name,
            seller_vat,
            timestamp: &timestamp,
            total: &total_text,
            vat_total: &tax_text,
        });

        tracing::debug!(
            uuid = %uuid,
            invoice_number = ?invoice.number,
            lines = document.line_count_numeric,
            total = %total_text,
            "UBL document built"
        );

        Ok(CanonicalDocument {
            uuid,
            invoice_hash: invoice_hash.to_string(),
            xml,
            issued_at,
            totals,
            qr_code,
        })
    }
}

fn party(
    tax_id: &str,
    name: &str,
    street: Option<&str>,
    city: Option<&str>,
    postal: Option<&str>,
) -> ubl::Party {
    ubl::Party {
        identification: ubl::PartyIdentification {
            id: ubl::SchemeId {
                scheme_id: TAX_SCHEME,
                value: tax_id.to_string(),
            },
        },
        name: ubl::PartyName {
            name: if name.is_empty() {
                PLACEHOLDER_COMPANY.to_string()
            } else {
                name.to_string()
            },
        },
        postal_address: ubl::PostalAddress {
            street_name: street.unwrap_or(PLACEHOLDER_STREET).to_string(),
            city_name: city.unwrap_or(PLACEHOLDER_CITY).to_string(),
            postal_zone: postal.unwrap_or(PLACEHOLDER_POSTAL).to_string(),
            country: ubl::Country {
                identification_code: COUNTRY,
            },
        },
        tax_scheme: ubl::PartyTaxScheme {
            company_id: tax_id.to_string(),
            tax_scheme: ubl::TaxScheme { id: TAX_SCHEME },
        },
    }
}

fn tax_total(
    taxable: Decimal,
    tax: Decimal,
    percent: &str,
    amount: &impl Fn(Decimal) -> ubl::Amount,
) -> ubl::TaxTotal {
    ubl::TaxTotal {
        tax_amount: amount(tax),
        subtotal: ubl::TaxSubtotal {
            taxable_amount: amount(taxable),
            tax_amount: amount(tax),
            percent: percent.to_string(),
            category: ubl::TaxCategory {
                id: TAX_CATEGORY,
                percent: percent.to_string(),
                tax_scheme: ubl::TaxScheme { id: TAX_SCHEME },
            },
        },
    }
}

fn invoice_line(
    id: usize,
    item: &LineItem,
    rate: Decimal,
    percent: &str,
    amount: &impl Fn(Decimal) -> ubl::Amount,
) -> ubl::InvoiceLine {
    let line_amount = money(item.line_amount());
    let line_tax = money(item.tax_amount(rate));

    ubl::InvoiceLine {
        id,
        quantity: ubl::Quantity {
            unit_code: "PCE",
            value: item.quantity.normalize().to_string(),
        },
        line_extension_amount: amount(line_amount),
        tax_total: tax_total(line_amount, line_tax, percent, amount),
        item: ubl::Item {
            description: item.description.clone(),
            name: item.name.clone(),
        },
        price: ubl::Price {
            price_amount: amount(money(item.unit_price)),
        },
    }
}

/// Round half away from zero to two places.
pub fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", money(value))
}

/// Parse the issue date the client sent. Accepts RFC 3339, naive ISO-8601,
/// `YYYY-MM-DD HH:MM[:SS]`, the mobile app's `YYYY-MM-DD – HH:MM` and a bare
/// date. Naive values are taken as UTC. Anything else falls back to now.
pub fn parse_issue_datetime(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        tracing::warn!("Invoice has no issue date, using current time");
        return Utc::now();
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    let spaced = raw.replace(" – ", " ").replace(" - ", " ");
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&spaced, format) {
            return parsed.and_utc();
        }
    }

    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return midnight.and_utc();
    }

    tracing::warn!(issue_date = %raw, "Unparseable issue date, using current time");
    Utc::now()
}
