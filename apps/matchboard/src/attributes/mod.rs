//! AttributeStore: canonical candidate and job-posting collections.
//!
//! Records live in an arena (`Vec`) indexed by id. The whole snapshot sits behind a
//! `RwLock<Arc<_>>`: readers clone the `Arc` and never observe a partial write, writers
//! copy-on-write through `Arc::make_mut`.

mod store;

pub use store::{AttributeSnapshot, AttributeStore};
