//! Applies ZATCA status callbacks to the local sync tables.
//!
//! Store writes are best effort: each one is attempted independently and its
//! outcome logged, and none of them can fail the callback once the payload
//! itself is acceptable.

use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::{json, Value};
use service_core::utils::signature::verify_body_signature;
use std::sync::Arc;

use crate::models::{AuditLogEntry, SyncStatus, SyncUpdate, WebhookPayload};
use crate::services::metrics::record_webhook_event;
use crate::services::store::{
    StoreError, SyncStore, INVOICES_TABLE, SYNC_LOGS_TABLE, SYNC_TRACKING_TABLE,
};

pub const SIGNATURE_HEADER: &str = "x-zatca-signature";

/// Map a ZATCA status word to the local sync status.
///
/// Stage-scoped events only complete the invoice at clearance; earlier
/// approvals leave it in progress.
pub fn map_status(status: &str) -> SyncStatus {
    match status {
        "approved" | "cleared" | "clearance_approved" => SyncStatus::Completed,
        "rejected" | "failed" | "compliance_rejected" | "reporting_failed"
        | "clearance_rejected" => SyncStatus::Failed,
        "processing" | "compliance_approved" | "reporting_submitted" => SyncStatus::InProgress,
        _ => SyncStatus::Pending,
    }
}

fn is_stage_event(status: &str) -> bool {
    matches!(
        status,
        "compliance_approved"
            | "compliance_rejected"
            | "reporting_submitted"
            | "reporting_failed"
            | "clearance_approved"
            | "clearance_rejected"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No secret configured; callbacks are accepted unsigned.
    Skipped,
    Valid,
    Invalid,
    Missing,
}

impl SignatureCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SignatureCheck::Skipped | SignatureCheck::Valid)
    }
}

pub fn verify_webhook_signature(
    secret: Option<&Secret<String>>,
    body: &[u8],
    signature: Option<&str>,
) -> SignatureCheck {
    let Some(secret) = secret else {
        tracing::warn!("ZATCA_WEBHOOK_SECRET not set, skipping webhook signature verification");
        return SignatureCheck::Skipped;
    };

    let Some(signature) = signature.filter(|s| !s.is_empty()) else {
        return SignatureCheck::Missing;
    };

    match verify_body_signature(secret.expose_secret(), body, signature) {
        Ok(true) => SignatureCheck::Valid,
        Ok(false) => SignatureCheck::Invalid,
        Err(e) => {
            tracing::error!(error = %e, "Webhook signature verification error");
            SignatureCheck::Invalid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Updated(u64),
    NotFound,
    Failed(String),
}

impl WriteOutcome {
    fn from_update(table: &str, uuid: &str, result: Result<u64, StoreError>) -> Self {
        match result {
            Ok(0) => {
                tracing::warn!(table, zatca_uuid = %uuid, "No row matched webhook update");
                WriteOutcome::NotFound
            }
            Ok(n) => {
                tracing::debug!(table, zatca_uuid = %uuid, rows = n, "Webhook update applied");
                WriteOutcome::Updated(n)
            }
            Err(e) => {
                tracing::error!(table, zatca_uuid = %uuid, error = %e, "Webhook update failed");
                WriteOutcome::Failed(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub sync_status: SyncStatus,
    pub invoices: WriteOutcome,
    pub sync_tracking: WriteOutcome,
    pub audit: WriteOutcome,
}

#[derive(Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn SyncStore>,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Apply a callback whose shape has already been validated.
    pub async fn reconcile(&self, payload: &WebhookPayload) -> ReconcileReport {
        let now = Utc::now();
        let sync_status = map_status(&payload.status);

        if is_stage_event(&payload.status) {
            tracing::info!(
                zatca_uuid = %payload.uuid,
                event = %payload.status,
                error_message = ?payload.error_message,
                "ZATCA stage event"
            );
        } else if sync_status == SyncStatus::Pending {
            tracing::warn!(
                zatca_uuid = %payload.uuid,
                status = %payload.status,
                "Unknown ZATCA status, recording as pending"
            );
        }

        let update = SyncUpdate {
            zatca_uuid: payload.uuid.clone(),
            sync_status,
            qr_code: payload.qr_code.clone(),
            response: zatca_response(payload, sync_status),
            error_message: payload.error_message.clone(),
            at: now,
        };

        let (invoices, tracking) = tokio::join!(
            self.store.update_invoice(&update),
            self.store.update_sync_tracking(&update),
        );
        let invoices = WriteOutcome::from_update(INVOICES_TABLE, &payload.uuid, invoices);
        let sync_tracking =
            WriteOutcome::from_update(SYNC_TRACKING_TABLE, &payload.uuid, tracking);

        let details = audit_details(payload);
        let entry = AuditLogEntry::webhook(&payload.uuid, &payload.status, details, now);
        let audit = match self.store.append_audit(&entry).await {
            Ok(()) => WriteOutcome::Updated(1),
            Err(e) => {
                tracing::error!(
                    table = SYNC_LOGS_TABLE,
                    zatca_uuid = %payload.uuid,
                    error = %e,
                    "Error logging webhook event"
                );
                WriteOutcome::Failed(e.to_string())
            }
        };

        record_webhook_event(sync_status.as_str());
        tracing::info!(
            zatca_uuid = %payload.uuid,
            sync_status = %sync_status,
            "Updated invoice from ZATCA webhook"
        );

        ReconcileReport {
            sync_status,
            invoices,
            sync_tracking,
            audit,
        }
    }
}

/// Callback payload as JSON text for the audit row. A payload that cannot be
/// encoded is logged and audited with empty details.
fn audit_details<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode webhook payload for audit log");
        String::new()
    })
}

/// Snapshot stored in `zatca_response`. The QR code is only kept for
/// completed invoices and the error text only for failed ones.
fn zatca_response(payload: &WebhookPayload, sync_status: SyncStatus) -> Value {
    let mut response = json!({
        "uuid": payload.uuid,
        "status": payload.status,
        "timestamp": payload.timestamp,
        "compliance_status": payload.compliance_status,
        "reporting_status": payload.reporting_status,
        "clearance_status": payload.clearance_status,
    });

    match sync_status {
        SyncStatus::Completed => {
            if let Some(qr) = &payload.qr_code {
                response["qr_code"] = json!(qr);
            }
        }
        SyncStatus::Failed => {
            if let Some(error) = &payload.error_message {
                response["error_message"] = json!(error);
            }
        }
        _ => {}
    }

    response
}
