//! UBL 2.1 invoice shape, serialized with quick-xml's serde support.
//!
//! Element order follows the UBL Invoice schema sequence; quick-xml writes
//! fields in declaration order, so do not reorder fields casually.

use serde::Serialize;

pub const NS_INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub const NS_CAC: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub const NS_CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

#[derive(Debug, Serialize)]
#[serde(rename = "Invoice")]
pub struct Invoice {
    #[serde(rename = "@xmlns")]
    pub xmlns: &'static str,
    #[serde(rename = "@xmlns:cac")]
    pub xmlns_cac: &'static str,
    #[serde(rename = "@xmlns:cbc")]
    pub xmlns_cbc: &'static str,

    #[serde(rename = "cbc:UBLVersionID")]
    pub ubl_version_id: &'static str,
    #[serde(rename = "cbc:ProfileID")]
    pub profile_id: &'static str,
    #[serde(rename = "cbc:ID")]
    pub id: String,
    #[serde(rename = "cbc:CopyIndicator")]
    pub copy_indicator: bool,
    #[serde(rename = "cbc:UUID")]
    pub uuid: String,
    #[serde(rename = "cbc:IssueDate")]
    pub issue_date: String,
    #[serde(rename = "cbc:IssueTime")]
    pub issue_time: String,
    #[serde(rename = "cbc:InvoiceTypeCode")]
    pub invoice_type_code: InvoiceTypeCode,
    #[serde(rename = "cbc:DocumentCurrencyCode")]
    pub document_currency_code: String,
    #[serde(rename = "cbc:TaxCurrencyCode")]
    pub tax_currency_code: String,
    #[serde(rename = "cbc:LineCountNumeric")]
    pub line_count_numeric: usize,
    #[serde(rename = "cac:AdditionalDocumentReference")]
    pub additional_document_reference: AdditionalDocumentReference,
    #[serde(rename = "cac:AccountingSupplierParty")]
    pub accounting_supplier_party: PartyWrapper,
    #[serde(rename = "cac:AccountingCustomerParty")]
    pub accounting_customer_party: PartyWrapper,
    #[serde(rename = "cac:PaymentMeans")]
    pub payment_means: PaymentMeans,
    #[serde(rename = "cac:TaxTotal")]
    pub tax_total: TaxTotal,
    #[serde(rename = "cac:LegalMonetaryTotal")]
    pub legal_monetary_total: LegalMonetaryTotal,
    #[serde(rename = "cac:InvoiceLine")]
    pub invoice_lines: Vec<InvoiceLine>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceTypeCode {
    #[serde(rename = "@name")]
    pub name: &'static str,
    #[serde(rename = "$text")]
    pub code: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AdditionalDocumentReference {
    #[serde(rename = "cbc:ID")]
    pub id: &'static str,
    #[serde(rename = "cac:Attachment")]
    pub attachment: Attachment,
}

#[derive(Debug, Serialize)]
pub struct Attachment {
    #[serde(rename = "cbc:EmbeddedDocumentBinaryObject")]
    pub embedded: EmbeddedObject,
}

#[derive(Debug, Serialize)]
pub struct EmbeddedObject {
    #[serde(rename = "@mimeCode")]
    pub mime_code: &'static str,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PartyWrapper {
    #[serde(rename = "cac:Party")]
    pub party: Party,
}

#[derive(Debug, Serialize)]
pub struct Party {
    #[serde(rename = "cac:PartyIdentification")]
    pub identification: PartyIdentification,
    #[serde(rename = "cac:PartyName")]
    pub name: PartyName,
    #[serde(rename = "cac:PostalAddress")]
    pub postal_address: PostalAddress,
    #[serde(rename = "cac:PartyTaxScheme")]
    pub tax_scheme: PartyTaxScheme,
}

#[derive(Debug, Serialize)]
pub struct PartyIdentification {
    #[serde(rename = "cbc:ID")]
    pub id: SchemeId,
}

#[derive(Debug, Serialize)]
pub struct SchemeId {
    #[serde(rename = "@schemeID")]
    pub scheme_id: &'static str,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PartyName {
    #[serde(rename = "cbc:Name")]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PostalAddress {
    #[serde(rename = "cbc:StreetName")]
    pub street_name: String,
    #[serde(rename = "cbc:CityName")]
    pub city_name: String,
    #[serde(rename = "cbc:PostalZone")]
    pub postal_zone: String,
    #[serde(rename = "cac:Country")]
    pub country: Country,
}

#[derive(Debug, Serialize)]
pub struct Country {
    #[serde(rename = "cbc:IdentificationCode")]
    pub identification_code: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PartyTaxScheme {
    #[serde(rename = "cbc:CompanyID")]
    pub company_id: String,
    #[serde(rename = "cac:TaxScheme")]
    pub tax_scheme: TaxScheme,
}

#[derive(Debug, Serialize)]
pub struct TaxScheme {
    #[serde(rename = "cbc:ID")]
    pub id: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PaymentMeans {
    #[serde(rename = "cbc:ID")]
    pub id: &'static str,
    #[serde(rename = "cbc:PaymentMeansCode")]
    pub code: &'static str,
}

/// Monetary amount, always rendered with two decimals.
#[derive(Debug, Clone, Serialize)]
pub struct Amount {
    #[serde(rename = "@currencyID")]
    pub currency_id: String,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct TaxTotal {
    #[serde(rename = "cbc:TaxAmount")]
    pub tax_amount: Amount,
    #[serde(rename = "cac:TaxSubtotal")]
    pub subtotal: TaxSubtotal,
}

#[derive(Debug, Serialize)]
pub struct TaxSubtotal {
    #[serde(rename = "cbc:TaxableAmount")]
    pub taxable_amount: Amount,
    #[serde(rename = "cbc:TaxAmount")]
    pub tax_amount: Amount,
    #[serde(rename = "cbc:Percent")]
    pub percent: String,
    #[serde(rename = "cac:TaxCategory")]
    pub category: TaxCategory,
}

#[derive(Debug, Serialize)]
pub struct TaxCategory {
    #[serde(rename = "cbc:ID")]
    pub id: &'static str,
    #[serde(rename = "cbc:Percent")]
    pub percent: String,
    #[serde(rename = "cac:TaxScheme")]
    pub tax_scheme: TaxScheme,
}

#[derive(Debug, Serialize)]
pub struct LegalMonetaryTotal {
    #[serde(rename = "cbc:LineExtensionAmount")]
    pub line_extension_amount: Amount,
    #[serde(rename = "cbc:TaxExclusiveAmount")]
    pub tax_exclusive_amount: Amount,
    #[serde(rename = "cbc:TaxInclusiveAmount")]
    pub tax_inclusive_amount: Amount,
    #[serde(rename = "cbc:AllowanceTotalAmount")]
    pub allowance_total_amount: Amount,
    #[serde(rename = "cbc:PayableAmount")]
    pub payable_amount: Amount,
}

#[derive(Debug, Serialize)]
pub struct InvoiceLine {
    #[serde(rename = "cbc:ID")]
    pub id: usize,
    #[serde(rename = "cbc:InvoicedQuantity")]
    pub quantity: Quantity,
    #[serde(rename = "cbc:LineExtensionAmount")]
    pub line_extension_amount: Amount,
    #[serde(rename = "cac:TaxTotal")]
    pub tax_total: TaxTotal,
    #[serde(rename = "cac:Item")]
    pub item: Item,
    #[serde(rename = "cac:Price")]
    pub price: Price,
}

#[derive(Debug, Serialize)]
pub struct Quantity {
    #[serde(rename = "@unitCode")]
    pub unit_code: &'static str,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct Item {
    #[serde(rename = "cbc:Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "cbc:Name")]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct Price {
    #[serde(rename = "cbc:PriceAmount")]
    pub price_amount: Amount,
}

impl Invoice {
    /// Serialize with an XML declaration.
    pub fn to_xml(&self) -> Result<String, String> {
        let body = quick_xml::se::to_string(self).map_err(|e| e.to_string())?;
        Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>{}"#,
            body
        ))
    }
}
