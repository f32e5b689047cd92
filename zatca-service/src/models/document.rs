use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// A generated UBL 2.1 invoice. Built once per submission and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalDocument {
    pub uuid: Uuid,
    pub invoice_hash: String,
    pub xml: String,
    pub issued_at: DateTime<Utc>,
    pub totals: MonetaryTotals,
    /// Base64 TLV QR payload derived from the seller and totals. Used when
    /// clearance does not hand back a QR code of its own.
    pub qr_code: String,
}

/// Amounts as they appear in the document, already rounded to two places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonetaryTotals {
    pub currency: String,
    pub line_extension: Decimal,
    pub allowance: Decimal,
    pub tax_exclusive: Decimal,
    pub tax: Decimal,
    pub tax_inclusive: Decimal,
}
