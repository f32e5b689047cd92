use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Local view of where an invoice stands with ZATCA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking row as stored in the `invoices` and `sync_tracking` tables.
/// Rows are created by the invoicing app; this service only updates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub zatca_uuid: String,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zatca_qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zatca_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SyncRecord {
    pub fn pending(zatca_uuid: impl Into<String>) -> Self {
        Self {
            zatca_uuid: zatca_uuid.into(),
            sync_status: SyncStatus::Pending,
            zatca_qr_code: None,
            zatca_response: None,
            error_message: None,
            sync_timestamp: None,
            updated_at: None,
        }
    }
}

/// Changes applied to a tracking row when a status callback arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    pub zatca_uuid: String,
    pub sync_status: SyncStatus,
    pub qr_code: Option<String>,
    pub response: serde_json::Value,
    pub error_message: Option<String>,
    pub at: DateTime<Utc>,
}

impl SyncUpdate {
    pub fn timestamp(&self) -> String {
        iso_timestamp(self.at)
    }

    /// Apply to an `invoices` row. That table has no sync bookkeeping columns.
    pub fn apply_to_invoice(&self, record: &mut SyncRecord) {
        record.sync_status = self.sync_status;
        record.zatca_qr_code = self.qr_code.clone();
        record.zatca_response = Some(self.response.clone());
        record.updated_at = Some(self.timestamp());
    }

    /// Apply to a `sync_tracking` row.
    pub fn apply_to_tracking(&self, record: &mut SyncRecord) {
        self.apply_to_invoice(record);
        record.error_message = self.error_message.clone();
        record.sync_timestamp = Some(self.timestamp());
    }
}

/// Append-only row in `sync_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub action: String,
    pub status: String,
    /// Raw callback payload, serialized as JSON text.
    pub details: String,
    pub timestamp: String,
    pub invoice_id: String,
    pub request_id: String,
}

impl AuditLogEntry {
    pub const WEBHOOK_ACTION: &'static str = "zatca_webhook";

    pub fn webhook(invoice_id: &str, status: &str, details: String, at: DateTime<Utc>) -> Self {
        Self {
            action: Self::WEBHOOK_ACTION.to_string(),
            status: status.to_string(),
            details,
            timestamp: iso_timestamp(at),
            invoice_id: invoice_id.to_string(),
            request_id: format!("webhook_{}", at.timestamp_millis()),
        }
    }
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
