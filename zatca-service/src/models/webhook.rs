use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Status callback posted by ZATCA.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct WebhookPayload {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub uuid: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearance_status: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_payload() {
        let payload: WebhookPayload =
            serde_json::from_value(json!({ "uuid": "abc", "status": "cleared" })).unwrap();
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn rejects_missing_or_blank_identity() {
        let missing: WebhookPayload = serde_json::from_value(json!({ "status": "cleared" })).unwrap();
        assert!(missing.validate().is_err());

        let blank: WebhookPayload =
            serde_json::from_value(json!({ "uuid": "abc", "status": "  " })).unwrap();
        assert!(blank.validate().is_err());
    }
}
