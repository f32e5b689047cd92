//! Invoice input model.
//!
//! The mobile client sends invoices with several historical field spellings
//! and with numbers sometimes encoded as strings. [`RawInvoice`] absorbs all
//! of that through prioritized field spellings and lenient parsing; the rest
//! of the service only ever sees the normalized [`InvoiceRecord`].

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::config::InvoiceDefaults;

/// ZATCA invoice flavour. Standard (B2B) invoices need the buyer's VAT
/// number; simplified (B2C) invoices do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    #[default]
    #[serde(alias = "tax", alias = "b2b")]
    Standard,
    #[serde(alias = "b2c")]
    Simplified,
}

impl InvoiceKind {
    /// `name` attribute of `cbc:InvoiceTypeCode`.
    pub fn transaction_code(&self) -> &'static str {
        match self {
            InvoiceKind::Standard => "0100000",
            InvoiceKind::Simplified => "0200000",
        }
    }
}

/// Invoice as received on the wire.
///
/// Every field accepts a list of spellings in priority order. The first
/// spelling that carries a usable value wins, so a payload mixing old and
/// new names resolves instead of failing.
#[derive(Debug, Clone, Default)]
pub struct RawInvoice {
    pub number: Option<i64>,
    pub date: Option<String>,
    pub customer: Option<String>,
    pub vat_number: Option<String>,
    pub salesman: Option<String>,
    pub kind: Option<InvoiceKind>,
    pub items: Option<Vec<RawLineItem>>,
    pub total: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub company: Option<RawCompany>,
}

impl RawInvoice {
    fn from_fields(fields: &Fields) -> Self {
        Self {
            number: fields.resolve(
                &["no", "number", "invoice_number", "invoiceNumber"],
                lenient::integer,
            ),
            date: fields.resolve(
                &["date", "issue_date", "issueDate", "created_at"],
                lenient::string,
            ),
            customer: fields.resolve(
                &["customer", "customer_name", "customerName"],
                lenient::string,
            ),
            vat_number: fields.resolve(
                &["vatNo", "vat_number", "vat_no", "customer_vat", "taxNumber"],
                lenient::string,
            ),
            salesman: fields.resolve(&["salesman"], lenient::string),
            kind: fields.resolve(&["type", "kind", "invoice_type", "invoiceType"], lenient::kind),
            items: fields.resolve(&["items", "lines", "line_items", "lineItems"], |value| {
                value.as_array().map(|items| {
                    items
                        .iter()
                        .map(|item| RawLineItem::from_fields(&Fields::of(item)))
                        .collect()
                })
            }),
            total: fields.resolve(&["total", "grand_total", "grandTotal"], lenient::decimal),
            vat_amount: fields.resolve(
                &["vatAmount", "vat_amount", "tax_amount", "taxAmount"],
                lenient::decimal,
            ),
            discount: fields.resolve(&["discount"], lenient::decimal),
            tax_rate: fields.resolve(
                &["taxRate", "tax_rate", "vat_rate", "vatRate"],
                lenient::decimal,
            ),
            currency: fields.resolve(&["currency"], lenient::string),
            company: fields.resolve(&["company", "seller"], |value| {
                value
                    .is_object()
                    .then(|| RawCompany::from_fields(&Fields::of(value)))
            }),
        }
    }
}

impl<'de> Deserialize<'de> for RawInvoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Fields(Map::deserialize(deserializer)?);
        Ok(Self::from_fields(&fields))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawLineItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
}

impl RawLineItem {
    fn from_fields(fields: &Fields) -> Self {
        Self {
            name: fields.resolve(&["name", "product", "item_name"], lenient::string),
            description: fields.resolve(&["description"], lenient::string),
            quantity: fields.resolve(&["quantity", "qty"], lenient::decimal),
            price: fields.resolve(&["price", "unit_price", "unitPrice", "rate"], lenient::decimal),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawCompany {
    pub vat_number: Option<String>,
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

impl RawCompany {
    fn from_fields(fields: &Fields) -> Self {
        Self {
            vat_number: fields.resolve(
                &["vatNo", "vat_number", "vat_no", "tax_number"],
                lenient::string,
            ),
            name: fields.resolve(
                &["ownerName1", "name", "company_name", "companyName"],
                lenient::string,
            ),
            street: fields.resolve(&["street", "address", "street_name"], lenient::string),
            city: fields.resolve(&["city"], lenient::string),
            postal_code: fields.resolve(&["postal_code", "postalCode", "zip"], lenient::string),
        }
    }
}

/// A JSON object looked up by any of several spellings.
#[derive(Debug, Default)]
struct Fields(Map<String, Value>);

impl Fields {
    /// Non-objects have no fields.
    fn of(value: &Value) -> Self {
        Fields(value.as_object().cloned().unwrap_or_default())
    }

    /// Absent, null and unparseable values fall through to the next spelling.
    fn resolve<T>(&self, keys: &[&str], parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(parse)
    }
}

/// Normalized invoice. Presence of the validated fields is still optional
/// here; [`crate::services::validator`] decides whether it can be submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecord {
    pub number: Option<i64>,
    pub issue_date: Option<String>,
    pub customer_name: String,
    pub customer_vat: Option<String>,
    pub salesman: Option<String>,
    pub kind: InvoiceKind,
    pub items: Vec<LineItem>,
    pub declared_total: Option<Decimal>,
    pub declared_tax: Option<Decimal>,
    pub discount: Decimal,
    /// Fraction, e.g. `0.15`.
    pub tax_rate: Decimal,
    pub currency: String,
    pub seller: Seller,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineItem {
    /// `quantity × unit price`, or `None` when it leaves `Decimal`'s range.
    pub fn checked_line_amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }

    /// Saturating; the validator rejects lines whose amount overflows.
    pub fn line_amount(&self) -> Decimal {
        self.quantity.saturating_mul(self.unit_price)
    }

    pub fn tax_amount(&self, rate: Decimal) -> Decimal {
        self.line_amount().saturating_mul(rate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Seller {
    pub vat_number: Option<String>,
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

impl InvoiceRecord {
    /// Parse and normalize a client invoice payload.
    pub fn from_json(
        value: serde_json::Value,
        defaults: &InvoiceDefaults,
    ) -> Result<Self, serde_json::Error> {
        let raw: RawInvoice = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw, defaults))
    }

    pub fn from_raw(raw: RawInvoice, defaults: &InvoiceDefaults) -> Self {
        let items = raw
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| LineItem {
                name: non_blank(item.name).unwrap_or_default(),
                description: non_blank(item.description),
                quantity: item.quantity.unwrap_or(Decimal::ONE),
                unit_price: item.price.unwrap_or(Decimal::ZERO),
            })
            .collect();

        let company = raw.company.unwrap_or_default();

        Self {
            number: raw.number,
            issue_date: non_blank(raw.date),
            customer_name: raw.customer.unwrap_or_default().trim().to_string(),
            customer_vat: non_blank(raw.vat_number),
            salesman: non_blank(raw.salesman),
            kind: raw.kind.unwrap_or_default(),
            items,
            declared_total: raw.total,
            declared_tax: raw.vat_amount,
            discount: raw.discount.unwrap_or(Decimal::ZERO),
            tax_rate: normalize_rate(raw.tax_rate.unwrap_or(defaults.tax_rate_percent)),
            currency: non_blank(raw.currency).unwrap_or_else(|| defaults.currency.clone()),
            seller: Seller {
                vat_number: non_blank(company.vat_number),
                name: non_blank(company.name),
                street: non_blank(company.street),
                city: non_blank(company.city),
                postal_code: non_blank(company.postal_code),
            },
        }
    }

    /// Sum of `quantity × unit price` over all lines.
    pub fn line_subtotal(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |sum, item| sum.saturating_add(item.line_amount()))
    }

    /// Declared VAT amount, or the flat rate applied to the line subtotal.
    pub fn tax_amount(&self) -> Decimal {
        self.declared_tax
            .unwrap_or_else(|| self.line_subtotal().saturating_mul(self.tax_rate))
    }

    /// Declared total, or `subtotal − discount + tax`.
    pub fn total(&self) -> Decimal {
        self.declared_total.unwrap_or_else(|| {
            self.line_subtotal()
                .saturating_sub(self.discount)
                .saturating_add(self.tax_amount())
        })
    }

    /// Amount the VAT is charged on.
    pub fn taxable_amount(&self) -> Decimal {
        self.total().saturating_sub(self.tax_amount())
    }

    /// Tax rate as a percentage, e.g. `15`.
    pub fn tax_rate_percent(&self) -> Decimal {
        self.tax_rate.saturating_mul(Decimal::ONE_HUNDRED).normalize()
    }

    pub fn checked_subtotal(&self) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |sum, item| {
            sum.checked_add(item.checked_line_amount()?)
        })
    }

    /// `(total, tax)` computed the same way as [`Self::total`] and
    /// [`Self::tax_amount`], or `None` if any step overflows.
    pub fn checked_totals(&self) -> Option<(Decimal, Decimal)> {
        let subtotal = self.checked_subtotal()?;
        let tax = match self.declared_tax {
            Some(tax) => tax,
            None => subtotal.checked_mul(self.tax_rate)?,
        };
        let total = match self.declared_total {
            Some(total) => total,
            None => subtotal.checked_sub(self.discount)?.checked_add(tax)?,
        };
        total.checked_sub(tax)?;
        Some((total, tax))
    }
}

/// Values of 1 and above are percentages (`15`, `1`); below 1 they are
/// fractions (`0.15`).
fn normalize_rate(rate: Decimal) -> Decimal {
    if rate >= Decimal::ONE {
        rate / Decimal::ONE_HUNDRED
    } else {
        rate
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Field parsers that accept numbers, numeric strings and nulls alike.
/// Values of the wrong shape become `None` and are caught by validation.
mod lenient {
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::str::FromStr;

    use super::InvoiceKind;

    fn parse_decimal(text: &str) -> Option<Decimal> {
        let text = text.trim();
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
    }

    pub fn decimal(value: &Value) -> Option<Decimal> {
        match value {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s),
            _ => None,
        }
    }

    pub fn integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Blank strings count as absent.
    pub fn string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Unknown words are logged and treated as absent.
    pub fn kind(value: &Value) -> Option<InvoiceKind> {
        let word = value.as_str()?.trim();
        if word.is_empty() {
            return None;
        }
        match serde_json::from_value(Value::String(word.to_ascii_lowercase())) {
            Ok(kind) => Some(kind),
            Err(_) => {
                tracing::warn!(invoice_type = %word, "Unknown invoice type ignored");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn defaults() -> InvoiceDefaults {
        InvoiceDefaults::default()
    }

    #[test]
    fn resolves_mobile_app_field_names() {
        let record = InvoiceRecord::from_json(
            json!({
                "no": 17,
                "date": "2024-03-01T10:15:00Z",
                "customer": "  Al Noor Trading ",
                "vatNo": "310122393500003",
                "salesman": "Omar",
                "total": 115.0,
                "vatAmount": 15.0,
                "items": [{ "name": "Widget", "quantity": 2, "price": 50 }],
                "company": { "vatNo": 300000000000003u64, "ownerName1": "Acme LLC" }
            }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(record.number, Some(17));
        assert_eq!(record.customer_name, "Al Noor Trading");
        assert_eq!(record.customer_vat.as_deref(), Some("310122393500003"));
        assert_eq!(record.seller.vat_number.as_deref(), Some("300000000000003"));
        assert_eq!(record.seller.name.as_deref(), Some("Acme LLC"));
        assert_eq!(record.declared_total, Some(dec("115")));
        assert_eq!(record.items[0].line_amount(), dec("100"));
        assert_eq!(record.tax_rate, dec("0.15"));
        assert_eq!(record.currency, "SAR");
    }

    #[test]
    fn resolves_snake_case_alternates_and_numeric_strings() {
        let record = InvoiceRecord::from_json(
            json!({
                "invoice_number": "42",
                "issue_date": "2024-03-01",
                "customer_name": "Buyer",
                "customer_vat": "399999999900003",
                "line_items": [{ "product": "Tea", "qty": "3", "unit_price": "2.50" }],
                "tax_rate": 0.05,
                "discount": "1.5",
                "type": "simplified"
            }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(record.number, Some(42));
        assert_eq!(record.kind, InvoiceKind::Simplified);
        assert_eq!(record.items[0].name, "Tea");
        assert_eq!(record.items[0].line_amount(), dec("7.50"));
        assert_eq!(record.tax_rate, dec("0.05"));
        assert_eq!(record.discount, dec("1.5"));
    }

    #[test]
    fn derives_totals_when_not_declared() {
        let record = InvoiceRecord::from_json(
            json!({
                "no": 1,
                "items": [
                    { "name": "A", "quantity": 2, "price": 100 },
                    { "name": "B", "quantity": 1, "price": 50 }
                ],
                "discount": 10
            }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(record.line_subtotal(), dec("250"));
        assert_eq!(record.tax_amount(), dec("37.50"));
        assert_eq!(record.total(), dec("277.50"));
        assert_eq!(record.taxable_amount(), dec("240"));
        assert_eq!(record.tax_rate_percent(), dec("15"));
    }

    #[test]
    fn first_usable_spelling_wins() {
        let record = InvoiceRecord::from_json(
            json!({
                "no": 7,
                "invoice_number": 9,
                "vatNo": "310122393500003",
                "vat_number": "399999999900003",
                "total": 115,
                "grandTotal": 999,
                "customer": "  ",
                "customer_name": "Fallback Buyer",
                "taxRate": null,
                "vat_rate": 5,
                "items": [{ "name": "Tea", "product": "Coffee", "qty": 2, "quantity": "x" }]
            }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(record.number, Some(7));
        assert_eq!(record.customer_vat.as_deref(), Some("310122393500003"));
        assert_eq!(record.declared_total, Some(dec("115")));
        assert_eq!(record.customer_name, "Fallback Buyer");
        assert_eq!(record.tax_rate, dec("0.05"));
        assert_eq!(record.items[0].name, "Tea");
        assert_eq!(record.items[0].quantity, dec("2"));
    }

    #[test]
    fn unknown_invoice_type_defaults_to_standard() {
        let record = InvoiceRecord::from_json(
            json!({ "no": 1, "type": "invoice", "items": [] }),
            &defaults(),
        )
        .unwrap();
        assert_eq!(record.kind, InvoiceKind::Standard);

        let record = InvoiceRecord::from_json(
            json!({ "no": 1, "type": "invoice", "invoice_type": "B2C" }),
            &defaults(),
        )
        .unwrap();
        assert_eq!(record.kind, InvoiceKind::Simplified);
    }

    #[test]
    fn rate_of_one_is_a_percentage() {
        let record =
            InvoiceRecord::from_json(json!({ "no": 1, "taxRate": 1 }), &defaults()).unwrap();
        assert_eq!(record.tax_rate, dec("0.01"));

        let record =
            InvoiceRecord::from_json(json!({ "no": 1, "taxRate": "0.15" }), &defaults()).unwrap();
        assert_eq!(record.tax_rate, dec("0.15"));
    }

    #[test]
    fn overflowing_amounts_saturate_and_fail_checked_math() {
        let record = InvoiceRecord::from_json(
            json!({
                "no": 1,
                "items": [{
                    "name": "Huge",
                    "quantity": "79228162514264337593543950335",
                    "price": 2
                }]
            }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(record.items[0].checked_line_amount(), None);
        assert_eq!(record.items[0].line_amount(), Decimal::MAX);
        assert_eq!(record.checked_subtotal(), None);
        assert_eq!(record.checked_totals(), None);
        assert_eq!(record.total(), Decimal::MAX);
    }

    #[test]
    fn checked_totals_match_plain_accessors() {
        let record = InvoiceRecord::from_json(
            json!({
                "no": 1,
                "items": [{ "name": "A", "quantity": 2, "price": 100 }],
                "discount": 10
            }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(
            record.checked_totals(),
            Some((record.total(), record.tax_amount()))
        );
    }

    #[test]
    fn non_object_invoice_is_an_error() {
        assert!(InvoiceRecord::from_json(json!("INV-1"), &defaults()).is_err());
    }

    #[test]
    fn garbage_numbers_become_absent() {
        let record = InvoiceRecord::from_json(
            json!({ "no": "INV-abc", "total": true, "items": [] }),
            &defaults(),
        )
        .unwrap();

        assert_eq!(record.number, None);
        assert_eq!(record.declared_total, None);
        assert!(record.items.is_empty());
    }
}
