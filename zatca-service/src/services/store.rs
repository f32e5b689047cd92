//! Persistence seam for invoice sync state.
//!
//! The tracking rows are owned by the invoicing app. This service only
//! updates them by `zatca_uuid` and appends audit entries.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{AuditLogEntry, SyncRecord, SyncUpdate};

pub const INVOICES_TABLE: &str = "invoices";
pub const SYNC_TRACKING_TABLE: &str = "sync_tracking";
pub const SYNC_LOGS_TABLE: &str = "sync_logs";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Encode(err.to_string())
    }
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Update the `invoices` row for `update.zatca_uuid`. Returns rows matched.
    async fn update_invoice(&self, update: &SyncUpdate) -> Result<u64, StoreError>;

    /// Update the `sync_tracking` row for `update.zatca_uuid`. Returns rows matched.
    async fn update_sync_tracking(&self, update: &SyncUpdate) -> Result<u64, StoreError>;

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Process-local store for tests and database-less local runs.
#[derive(Default)]
pub struct InMemorySyncStore {
    invoices: DashMap<String, SyncRecord>,
    tracking: DashMap<String, SyncRecord>,
    audit: Mutex<Vec<AuditLogEntry>>,
    failing: DashSet<&'static str>,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert pending rows for `zatca_uuid` in both tables.
    pub fn seed(&self, zatca_uuid: &str) {
        self.invoices
            .insert(zatca_uuid.to_string(), SyncRecord::pending(zatca_uuid));
        self.tracking
            .insert(zatca_uuid.to_string(), SyncRecord::pending(zatca_uuid));
    }

    pub fn invoice(&self, zatca_uuid: &str) -> Option<SyncRecord> {
        self.invoices.get(zatca_uuid).map(|r| r.value().clone())
    }

    pub fn tracking(&self, zatca_uuid: &str) -> Option<SyncRecord> {
        self.tracking.get(zatca_uuid).map(|r| r.value().clone())
    }

    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.lock().await.clone()
    }

    /// Make every write to `table` fail until the store is dropped.
    pub fn fail_table(&self, table: &'static str) {
        self.failing.insert(table);
    }

    fn check(&self, table: &'static str) -> Result<(), StoreError> {
        if self.failing.contains(table) {
            return Err(StoreError::Unavailable(format!("{} is unavailable", table)));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncStore for InMemorySyncStore {
    async fn update_invoice(&self, update: &SyncUpdate) -> Result<u64, StoreError> {
        self.check(INVOICES_TABLE)?;
        Ok(match self.invoices.get_mut(&update.zatca_uuid) {
            Some(mut record) => {
                update.apply_to_invoice(&mut record);
                1
            }
            None => 0,
        })
    }

    async fn update_sync_tracking(&self, update: &SyncUpdate) -> Result<u64, StoreError> {
        self.check(SYNC_TRACKING_TABLE)?;
        Ok(match self.tracking.get_mut(&update.zatca_uuid) {
            Some(mut record) => {
                update.apply_to_tracking(&mut record);
                1
            }
            None => 0,
        })
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.check(SYNC_LOGS_TABLE)?;
        self.audit.lock().await.push(entry.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
