use async_trait::async_trait;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::models::{AuditLogEntry, SyncUpdate};
use crate::services::store::{
    StoreError, SyncStore, INVOICES_TABLE, SYNC_LOGS_TABLE, SYNC_TRACKING_TABLE,
};

#[derive(Clone)]
pub struct MongoSyncStore {
    db: Database,
    invoices: Collection<Document>,
    sync_tracking: Collection<Document>,
    sync_logs: Collection<AuditLogEntry>,
}

impl MongoSyncStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            StoreError::from(e)
        })?;
        client_options.app_name = Some("zatca-service".to_string());

        let client = Client::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            StoreError::from(e)
        })?;

        Ok(Self::new(client.database(db_name)))
    }

    pub fn new(db: Database) -> Self {
        Self {
            invoices: db.collection(INVOICES_TABLE),
            sync_tracking: db.collection(SYNC_TRACKING_TABLE),
            sync_logs: db.collection(SYNC_LOGS_TABLE),
            db,
        }
    }

    /// Webhook updates look rows up by `zatca_uuid`; audit reads go by invoice.
    pub async fn init_indexes(&self) -> Result<(), StoreError> {
        let uuid_index = || {
            IndexModel::builder()
                .keys(doc! { "zatca_uuid": 1 })
                .options(
                    IndexOptions::builder()
                        .name("zatca_uuid_idx".to_string())
                        .build(),
                )
                .build()
        };

        self.invoices.create_index(uuid_index(), None).await?;
        self.sync_tracking.create_index(uuid_index(), None).await?;

        let audit_index = IndexModel::builder()
            .keys(doc! { "invoice_id": 1, "timestamp": -1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_audit_idx".to_string())
                    .build(),
            )
            .build();
        self.sync_logs.create_index(audit_index, None).await?;

        tracing::info!("ZATCA sync store indexes initialized");
        Ok(())
    }

    fn invoice_fields(update: &SyncUpdate) -> Result<Document, StoreError> {
        Ok(doc! {
            "sync_status": update.sync_status.as_str(),
            "zatca_uuid": &update.zatca_uuid,
            "zatca_qr_code": update.qr_code.clone(),
            "zatca_response": to_bson(&update.response)?,
            "updated_at": update.timestamp(),
        })
    }
}

#[async_trait]
impl SyncStore for MongoSyncStore {
    async fn update_invoice(&self, update: &SyncUpdate) -> Result<u64, StoreError> {
        let fields = Self::invoice_fields(update)?;
        let result = self
            .invoices
            .update_one(
                doc! { "zatca_uuid": &update.zatca_uuid },
                doc! { "$set": fields },
                None,
            )
            .await?;
        Ok(result.matched_count)
    }

    async fn update_sync_tracking(&self, update: &SyncUpdate) -> Result<u64, StoreError> {
        let mut fields = Self::invoice_fields(update)?;
        fields.insert("sync_timestamp", update.timestamp());
        fields.insert("error_message", update.error_message.clone());

        let result = self
            .sync_tracking
            .update_one(
                doc! { "zatca_uuid": &update.zatca_uuid },
                doc! { "$set": fields },
                None,
            )
            .await?;
        Ok(result.matched_count)
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.sync_logs.insert_one(entry, None).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
