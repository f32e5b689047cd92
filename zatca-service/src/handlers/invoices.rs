use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use service_core::middleware::tracing::RequestId;

use crate::error::ZatcaError;
use crate::models::sync::iso_timestamp;
use crate::models::InvoiceRecord;
use crate::services::gateway::SubmissionContext;
use crate::services::hashing::fingerprint;
use crate::services::pipeline::StageStatuses;
use crate::services::validator::validate_invoice;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitInvoiceRequest {
    #[serde(default)]
    pub invoice: Option<serde_json::Value>,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    /// Client-side send time. Logged only.
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitInvoiceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub statuses: StageStatuses,
    /// Set when testing mode answered instead of ZATCA.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

/// `POST /invoices/submit`
///
/// Validates the invoice, builds and signs the UBL document and runs it
/// through compliance, reporting and clearance. Any failure is a 400 with
/// the reason in `error`.
pub async fn submit_invoice(
    State(state): State<AppState>,
    Extension(header_id): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let request: SubmitInvoiceRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable invoice submission");
            return ZatcaError::InvalidRequest(format!("Invalid request body: {}", e))
                .into_response_with(None);
        }
    };

    let request_id = request.request_id.clone();
    match process(&state, request, header_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response_with(request_id),
    }
}

async fn process(
    state: &AppState,
    request: SubmitInvoiceRequest,
    header_id: RequestId,
) -> Result<SubmitInvoiceResponse, ZatcaError> {
    let invoice = request
        .invoice
        .filter(|v| !v.is_null())
        .ok_or_else(|| ZatcaError::InvalidRequest("Invoice data is required".to_string()))?;

    let record = InvoiceRecord::from_json(invoice, &state.config.invoice)
        .map_err(|e| ZatcaError::InvalidRequest(format!("Invalid invoice data: {}", e)))?;

    tracing::info!(
        invoice_number = ?record.number,
        kind = ?record.kind,
        items = record.items.len(),
        client_timestamp = ?request.timestamp,
        "Processing invoice submission"
    );

    let report = validate_invoice(&record);
    if !report.is_valid {
        return Err(ZatcaError::Validation(report.errors));
    }

    let invoice_hash = fingerprint(&record);
    let document = state
        .builder
        .build(&record, &invoice_hash)
        .map_err(|e| ZatcaError::Internal(e.to_string()))?;
    let signed = state
        .signer
        .sign(document)
        .map_err(|e| ZatcaError::Internal(e.to_string()))?;

    let ctx = SubmissionContext {
        request_id: Some(
            request
                .request_id
                .clone()
                .unwrap_or_else(|| header_id.as_str().to_string()),
        ),
    };

    let outcome = state.pipeline.submit(&signed, &ctx).await;

    if !outcome.is_success() {
        return Err(ZatcaError::Upstream {
            message: outcome
                .error
                .unwrap_or_else(|| "ZATCA submission failed".to_string()),
            statuses: outcome.statuses,
        });
    }

    Ok(SubmitInvoiceResponse {
        success: true,
        uuid: outcome.uuid,
        qr_code: outcome.qr_code,
        timestamp: iso_timestamp(Utc::now()),
        request_id: request.request_id,
        statuses: outcome.statuses,
        simulated: outcome.bypassed,
    })
}
