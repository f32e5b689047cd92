use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 over the exact body bytes.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex HMAC-SHA256 body signature using constant-time comparison.
///
/// Hex case is ignored; surrounding whitespace in the header value is not.
pub fn verify_body_signature(
    secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = sign_body(secret, body)?;
    let provided = signature.to_ascii_lowercase();

    if expected.len() != provided.len() {
        return Ok(false);
    }

    Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "webhook_secret";
    const BODY: &[u8] = br#"{"uuid":"abc","status":"cleared"}"#;

    #[test]
    fn signature_roundtrip() {
        let signature = sign_body(SECRET, BODY).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_body_signature(SECRET, BODY, &signature).unwrap());
        assert!(verify_body_signature(SECRET, BODY, &signature.to_uppercase()).unwrap());
    }

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2
        let signature = sign_body("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = sign_body(SECRET, BODY).unwrap();
        let tampered = br#"{"uuid":"abc","status":"failed"}"#;
        assert!(!verify_body_signature(SECRET, tampered, &signature).unwrap());
    }

    #[test]
    fn wrong_secret_and_truncated_signature_are_rejected() {
        let signature = sign_body(SECRET, BODY).unwrap();
        assert!(!verify_body_signature("other", BODY, &signature).unwrap());
        assert!(!verify_body_signature(SECRET, BODY, &signature[..10]).unwrap());
    }
}
