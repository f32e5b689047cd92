pub mod document;
pub mod invoice;
pub mod sync;
pub mod webhook;

pub use document::{CanonicalDocument, MonetaryTotals};
pub use invoice::{InvoiceKind, InvoiceRecord, LineItem, RawInvoice, Seller};
pub use sync::{AuditLogEntry, SyncRecord, SyncStatus, SyncUpdate};
pub use webhook::WebhookPayload;
