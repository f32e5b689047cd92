use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::error::ZatcaError;
use crate::models::sync::iso_timestamp;
use crate::models::WebhookPayload;
use crate::services::reconciler::{verify_webhook_signature, SIGNATURE_HEADER};
use crate::startup::AppState;

/// `POST /webhooks/zatca`
///
/// Verifies the callback signature against the raw body, then hands the
/// payload to the reconciler. Store failures are logged and never change the
/// response once the payload itself is acceptable.
pub async fn zatca_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let check = verify_webhook_signature(state.config.webhook.secret.as_ref(), &body, signature);
    if !check.is_accepted() {
        tracing::warn!(check = ?check, "Rejected ZATCA webhook");
        return ZatcaError::Signature.into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse ZATCA webhook");
            return ZatcaError::InvalidPayload.into_response();
        }
    };

    if payload.validate().is_err() {
        return ZatcaError::InvalidPayload.into_response();
    }

    tracing::info!(
        zatca_uuid = %payload.uuid,
        status = %payload.status,
        "Processing ZATCA webhook"
    );

    let report = state.reconciler.reconcile(&payload).await;
    tracing::debug!(report = ?report, "ZATCA webhook reconciled");

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Webhook processed successfully",
            "timestamp": iso_timestamp(Utc::now()),
        })),
    )
        .into_response()
}
