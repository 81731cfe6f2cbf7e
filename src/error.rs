use thiserror::Error;

use crate::codec::CodecError;

/// Error type for [`DocumentStore`](crate::DocumentStore) operations.
///
/// Generic over the backend's own error type so callers can still match on
/// what the storage engine reported.
#[derive(Debug, Error)]
pub enum StoreError<E> {
    /// The table could not be probed or created. The store is unusable.
    #[error("failed to initialize table {table:?}: {source}")]
    Init {
        /// Table being bootstrapped.
        table: String,
        /// What the backend reported.
        source: E,
    },
    /// A statement or transaction failed in the backend.
    #[error("backend error: {0}")]
    Backend(E),
    /// The document body could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
    /// A stored record holds something that is not a JSON object.
    #[error("record {id:?} is malformed: {source}")]
    Deserialize {
        /// Id of the offending record.
        id: String,
        /// Parser failure.
        #[source]
        source: CodecError,
    },
    /// A key was empty or not a string.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// A document without a `key` was used where one is required.
    #[error("document has no key")]
    MissingKey,
    /// An update targeted a key that has no record.
    #[error("no document with key {0:?}")]
    NotFound(String),
    /// The configured table name cannot be used as an identifier.
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
}

impl<E> StoreError<E> {
    /// Returns `true` if the error came from the storage backend.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Init { .. })
    }
}
