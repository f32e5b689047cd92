//! Simplified-invoice QR payload: TLV records, base64 encoded.
//!
//! Tag 1 seller name, 2 seller VAT number, 3 timestamp, 4 invoice total
//! (with VAT), 5 VAT total. Lengths are a single byte, so values are capped
//! at 255 bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrFields<'a> {
    pub seller_name: &'a str,
    pub seller_vat: &'a str,
    pub timestamp: &'a str,
    pub total: &'a str,
    pub vat_total: &'a str,
}

pub fn encode_tlv(fields: &QrFields<'_>) -> String {
    let mut buffer = Vec::new();
    for (tag, value) in [
        (1u8, fields.seller_name),
        (2, fields.seller_vat),
        (3, fields.timestamp),
        (4, fields.total),
        (5, fields.vat_total),
    ] {
        let value = truncate_utf8(value, u8::MAX as usize);
        buffer.push(tag);
        buffer.push(value.len() as u8);
        buffer.extend_from_slice(value.as_bytes());
    }
    STANDARD.encode(buffer)
}

fn truncate_utf8(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
