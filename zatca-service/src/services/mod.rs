pub mod document_builder;
pub mod gateway;
pub mod hashing;
pub mod metrics;
pub mod mongo_store;
pub mod pipeline;
pub mod qr;
pub mod reconciler;
pub mod signing;
pub mod store;
pub mod ubl;
pub mod validator;

pub use document_builder::DocumentBuilder;
pub use gateway::{HttpZatcaGateway, ZatcaGateway};
pub use metrics::{get_metrics, init_metrics};
pub use mongo_store::MongoSyncStore;
pub use pipeline::SubmissionPipeline;
pub use reconciler::WebhookReconciler;
pub use signing::InvoiceSigner;
pub use store::{InMemorySyncStore, SyncStore};
