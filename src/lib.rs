//! # lawnchair
//!
//! A lightweight JSON document store over transactional SQL backends.
//!
//! Documents are JSON objects. Saving one without a `key` inserts it under a
//! fresh UUID; saving one with a `key` updates that record. Everything lives
//! in a single `(id, value, timestamp)` table, and every call runs in its own
//! backend transaction.
//!
//! ## Quick Start
//!
//! ```
//! use lawnchair::{Document, DocumentStore, MemoryBackend};
//! use serde_json::json;
//!
//! let store = DocumentStore::open(MemoryBackend::new()).unwrap();
//!
//! for height in [3, 12, 7] {
//!     let mut plant = Document::from_value(json!({"height": height})).unwrap();
//!     store.save(&mut plant).unwrap();
//! }
//!
//! let mut tall = Vec::new();
//! store
//!     .find(|d| d["height"].as_i64() > Some(5), |d, _| tall.push(d))
//!     .unwrap();
//! assert_eq!(tall.len(), 2);
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature flag | Use case |
//! |---------|-------------|----------|
//! | [`MemoryBackend`] | *(always available)* | Testing, prototyping |
//! | `SqliteBackend` | `sqlite` (default) | Edge Linux, mobile, desktop |
//!
//! Any engine that can run [`Statement`]s inside an atomic transaction can
//! implement [`Backend`].

mod codec;
mod document;
mod error;
pub mod id;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;
mod traits;

pub use codec::{deserialize, serialize, CodecError};
pub use document::{AsKey, Document, KEY_FIELD};
pub use error::StoreError;
pub use memory::{MemoryBackend, MemoryError};
#[cfg(feature = "sqlite")]
pub use sqlite::{JournalMode, SqliteBackend, SqliteConfig, SqliteError};
pub use store::{
    DocumentStore, DocumentStoreBuilder, Operation, StoreConfig, DEFAULT_DISPLAY, DEFAULT_MAX,
    DEFAULT_NAME, DEFAULT_TABLE, DEFAULT_VERSION,
};
pub use traits::*;
