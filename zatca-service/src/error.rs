use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::models::sync::iso_timestamp;
use crate::services::pipeline::StageStatuses;

/// Request-level failures. Every variant is answered with HTTP 400 and the
/// error text in the body; the client app shows it to the user as-is.
#[derive(Debug, Error)]
pub enum ZatcaError {
    #[error("Invoice validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0}")]
    InvalidRequest(String),

    /// ZATCA refused a stage or could not be reached.
    #[error("{message}")]
    Upstream {
        message: String,
        statuses: StageStatuses,
    },

    #[error("Invalid webhook signature")]
    Signature,

    #[error("Invalid webhook payload")]
    InvalidPayload,

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(flatten)]
    statuses: StageStatuses,
}

impl ZatcaError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Render with the caller's request id echoed back.
    pub fn into_response_with(self, request_id: Option<String>) -> Response {
        let status = self.status_code();
        let error = self.to_string();

        match &self {
            ZatcaError::Internal(_) => tracing::error!(error = %error, "ZATCA processing error"),
            _ => tracing::warn!(error = %error, "ZATCA request rejected"),
        }

        let statuses = match self {
            ZatcaError::Upstream { statuses, .. } => statuses,
            _ => StageStatuses::default(),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error,
                timestamp: iso_timestamp(Utc::now()),
                request_id,
                statuses,
            }),
        )
            .into_response()
    }
}

impl IntoResponse for ZatcaError {
    fn into_response(self) -> Response {
        self.into_response_with(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_joins_errors() {
        let err = ZatcaError::Validation(vec![
            "Invalid invoice number".to_string(),
            "Invoice date is required".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invoice validation failed: Invalid invoice number, Invoice date is required"
        );
    }

    #[test]
    fn every_variant_is_bad_request() {
        assert_eq!(
            ZatcaError::Signature.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ZatcaError::Internal("boom".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
