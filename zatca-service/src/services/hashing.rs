use sha2::{Digest, Sha256};

use crate::models::InvoiceRecord;

/// Lowercase hex SHA-256 of `bytes`.
pub fn invoice_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash of the identity fields `number|date|customer|vat|total|vat_amount`.
/// Amounts are rendered with two decimals so `115` and `115.00` agree.
pub fn fingerprint(invoice: &InvoiceRecord) -> String {
    let canonical = format!(
        "{}|{}|{}|{}|{:.2}|{:.2}",
        invoice.number.map(|n| n.to_string()).unwrap_or_default(),
        invoice.issue_date.as_deref().unwrap_or_default(),
        invoice.customer_name,
        invoice.customer_vat.as_deref().unwrap_or_default(),
        invoice.total(),
        invoice.tax_amount(),
    );
    invoice_hash(canonical.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvoiceDefaults;
    use serde_json::json;

    #[test]
    fn matches_known_sha256_vector() {
        assert_eq!(
            invoice_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_ignores_amount_formatting() {
        let defaults = InvoiceDefaults::default();
        let a = InvoiceRecord::from_json(
            json!({ "no": 7, "date": "2024-03-01", "customer": "X", "total": 115, "vatAmount": 15 }),
            &defaults,
        )
        .unwrap();
        let b = InvoiceRecord::from_json(
            json!({ "no": "7", "date": "2024-03-01", "customer": "X", "total": "115.00", "vatAmount": 15.0 }),
            &defaults,
        )
        .unwrap();

        let hash = fingerprint(&a);
        assert_eq!(hash, fingerprint(&b));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_changes_with_customer() {
        let defaults = InvoiceDefaults::default();
        let a = InvoiceRecord::from_json(json!({ "no": 7, "customer": "X" }), &defaults).unwrap();
        let b = InvoiceRecord::from_json(json!({ "no": 7, "customer": "Y" }), &defaults).unwrap();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
