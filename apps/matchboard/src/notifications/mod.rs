//! NotificationStore: persisted, newest-first notification log with incremental paging.

pub mod document_store;
mod pagination;
mod store;

pub use document_store::{DocumentStore, FileDocumentStore, InMemoryDocumentStore, StorageError};
pub use pagination::{LoadedRange, Page};
pub use store::{NotificationStore, NOTIFICATIONS_KEY};
