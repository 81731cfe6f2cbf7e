//! The document store.
//!
//! `DocumentStore` wraps a transactional [`Backend`] and exposes documents
//! instead of rows. It decides between insert and update, assigns keys,
//! and encodes bodies as JSON.
//!
//! # Example
//!
//! ```
//! use lawnchair::{Document, DocumentStore, MemoryBackend};
//! use serde_json::json;
//!
//! let store = DocumentStore::open(MemoryBackend::new()).unwrap();
//!
//! let mut doc = Document::from_value(json!({"name": "rake"})).unwrap();
//! let key = store.save(&mut doc).unwrap();
//! assert_eq!(doc.key(), Some(key.as_str()));
//!
//! let loaded = store.get(&key).unwrap().unwrap();
//! assert_eq!(loaded, doc);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec;
use crate::document::{AsKey, Document};
use crate::error::StoreError;
use crate::id;
use crate::traits::{Backend, Record, Statement};

/// Database name used when none is configured.
pub const DEFAULT_NAME: &str = "Lawnchair";
/// Schema version used when none is configured.
pub const DEFAULT_VERSION: &str = "1.0";
/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "field";
/// Display label used when none is configured.
pub const DEFAULT_DISPLAY: &str = "shed";
/// Storage cap in bytes used when none is configured.
pub const DEFAULT_MAX: u64 = 65536;

type Result<T, E> = std::result::Result<T, StoreError<E>>;

type ErrorHook<E> = Arc<dyn Fn(Operation, &StoreError<E>) + Send + Sync>;
type DataHook = Arc<dyn Fn(Operation, usize) + Send + Sync>;

/// Configuration for a `DocumentStore`.
///
/// Every field has a fixed default. When deserialized, missing and `null`
/// fields take their default, and a bare string is read as a table name.
///
/// ```
/// use lawnchair::StoreConfig;
///
/// let config: StoreConfig = serde_json::from_str(r#"{"table": "tools", "max": null}"#).unwrap();
/// assert_eq!(config.table, "tools");
/// assert_eq!(config.max, 65536);
///
/// let shorthand: StoreConfig = serde_json::from_str(r#""tools""#).unwrap();
/// assert_eq!(shorthand, config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreConfig {
    /// Database name.
    pub name: String,
    /// Schema version of the database.
    pub version: String,
    /// Table holding the documents.
    pub table: String,
    /// Human-readable label of the database.
    pub display: String,
    /// Storage cap in bytes.
    pub max: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            table: DEFAULT_TABLE.to_string(),
            display: DEFAULT_DISPLAY.to_string(),
            max: DEFAULT_MAX,
        }
    }
}

impl From<&str> for StoreConfig {
    fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }
}

impl<'de> Deserialize<'de> for StoreConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Options {
            name: Option<String>,
            version: Option<String>,
            table: Option<String>,
            display: Option<String>,
            max: Option<u64>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Table(String),
            Options(Options),
        }

        let defaults = StoreConfig::default();
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Table(table) => StoreConfig::from(table.as_str()),
            Raw::Options(o) => StoreConfig {
                name: o.name.unwrap_or(defaults.name),
                version: o.version.unwrap_or(defaults.version),
                table: o.table.unwrap_or(defaults.table),
                display: o.display.unwrap_or(defaults.display),
                max: o.max.unwrap_or(defaults.max),
            },
        })
    }
}

/// The public call an error or data notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Table bootstrap during construction.
    Init,
    /// [`DocumentStore::get`].
    Get,
    /// [`DocumentStore::save`].
    Save,
    /// [`DocumentStore::remove`].
    Remove,
    /// [`DocumentStore::nuke`].
    Nuke,
    /// [`DocumentStore::all`] and everything built on it.
    All,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Get => "get",
            Self::Save => "save",
            Self::Remove => "remove",
            Self::Nuke => "nuke",
            Self::All => "all",
        };
        f.write_str(name)
    }
}

/// Builder for constructing a `DocumentStore` with custom configuration.
pub struct DocumentStoreBuilder<B: Backend> {
    backend: B,
    config: StoreConfig,
    on_error: ErrorHook<B::Error>,
    on_data: DataHook,
}

impl<B: Backend> DocumentStoreBuilder<B> {
    /// Replace the whole configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the table holding the documents.
    pub fn table(mut self, table: &str) -> Self {
        self.config.table = table.to_string();
        self
    }

    /// Install the error hook.
    ///
    /// It receives every error an operation returns, before the caller sees
    /// it. The default hook does nothing.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(Operation, &StoreError<B::Error>) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(hook);
        self
    }

    /// Install the data hook.
    ///
    /// It receives the number of deleted records after every successful
    /// `remove` and `nuke`. The default hook does nothing.
    pub fn on_data<F>(mut self, hook: F) -> Self
    where
        F: Fn(Operation, usize) + Send + Sync + 'static,
    {
        self.on_data = Arc::new(hook);
        self
    }

    /// Build the store, creating its table if needed.
    pub fn build(self) -> Result<DocumentStore<B>, B::Error> {
        let store = DocumentStore {
            backend: self.backend,
            config: self.config,
            on_error: self.on_error,
            on_data: self.on_data,
        };
        let result = store.init();
        store.observe(Operation::Init, result)?;
        Ok(store)
    }
}

/// A JSON document store over one table of a transactional backend.
///
/// Each call runs in its own backend transaction and either applies
/// completely or not at all. The store keeps no state between calls, so it
/// can be shared across threads behind an `Arc`.
pub struct DocumentStore<B: Backend> {
    backend: B,
    config: StoreConfig,
    on_error: ErrorHook<B::Error>,
    on_data: DataHook,
}

impl<B: Backend> DocumentStore<B> {
    /// Open a store on `backend` with the default configuration.
    pub fn open(backend: B) -> Result<Self, B::Error> {
        Self::builder(backend).build()
    }

    /// Open a store on `backend` with the given configuration.
    pub fn with_config(backend: B, config: StoreConfig) -> Result<Self, B::Error> {
        Self::builder(backend).config(config).build()
    }

    /// Create a builder for advanced configuration.
    pub fn builder(backend: B) -> DocumentStoreBuilder<B> {
        DocumentStoreBuilder {
            backend,
            config: StoreConfig::default(),
            on_error: Arc::new(|_: Operation, _: &StoreError<B::Error>| {}),
            on_data: Arc::new(|_: Operation, _: usize| {}),
        }
    }

    /// The table holding the documents.
    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// The configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch the document stored under `key`.
    ///
    /// Returns `Ok(None)` if there is no such document.
    pub fn get(&self, key: &str) -> Result<Option<Document>, B::Error> {
        let result = self.fetch(key);
        self.observe(Operation::Get, result)
    }

    /// Persist a document and return its key.
    ///
    /// A document without a `key` is inserted under a freshly generated
    /// UUID. A document with a `key` overwrites the record with that id; if
    /// there is none the call fails with [`StoreError::NotFound`] and
    /// nothing is written. On success `doc` carries its key. On failure it
    /// is left untouched.
    pub fn save(&self, doc: &mut Document) -> Result<String, B::Error> {
        let result = self.persist(doc);
        self.observe(Operation::Save, result)
    }

    /// Delete a record by key or by document.
    ///
    /// Deleting a key that does not exist is not an error. Returns the
    /// number of records deleted.
    pub fn remove<K: AsKey>(&self, target: K) -> Result<usize, B::Error> {
        let result = self.delete(target.as_key());
        let result = self.observe(Operation::Remove, result)?;
        (self.on_data)(Operation::Remove, result);
        Ok(result)
    }

    /// Delete every record in the table. Returns the store for chaining.
    pub fn nuke(&self) -> Result<&Self, B::Error> {
        let table = self.table();
        let result = self
            .backend
            .transaction(|tx| tx.execute(&Statement::DeleteAll { table }))
            .map_err(StoreError::Backend);
        let removed = self.observe(Operation::Nuke, result)?.rows_affected;
        debug!(target: "lawnchair::store", table, removed, "nuked table");
        (self.on_data)(Operation::Nuke, removed);
        Ok(self)
    }

    /// Every document in the table, in the backend's scan order.
    ///
    /// Fails as a whole if any stored record is malformed.
    pub fn all(&self) -> Result<Vec<Document>, B::Error> {
        let result = self.scan();
        self.observe(Operation::All, result)
    }

    /// Call `f(document, index)` for every document, in [`all`](Self::all) order.
    ///
    /// Nothing is called if the scan fails.
    pub fn each<F>(&self, mut f: F) -> Result<(), B::Error>
    where
        F: FnMut(Document, usize),
    {
        for (index, doc) in self.all()?.into_iter().enumerate() {
            f(doc, index);
        }
        Ok(())
    }

    /// Call `f(document, index)` for every document matching `predicate`.
    ///
    /// `index` is the document's position in the full scan, not among the
    /// matches.
    pub fn find<P, F>(&self, predicate: P, mut f: F) -> Result<(), B::Error>
    where
        P: Fn(&Document) -> bool,
        F: FnMut(Document, usize),
    {
        self.each(|doc, index| {
            if predicate(&doc) {
                f(doc, index);
            }
        })
    }

    fn init(&self) -> Result<(), B::Error> {
        let table = self.table();
        if table.is_empty() || table.contains('\0') {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        let created = self
            .backend
            .transaction(|tx| {
                if tx.execute(&Statement::Probe { table }).is_ok() {
                    return Ok(false);
                }
                tx.execute(&Statement::CreateTable { table })?;
                Ok(true)
            })
            .map_err(|source| StoreError::Init {
                table: table.to_string(),
                source,
            })?;

        if created {
            info!(target: "lawnchair::store", table, "created table");
        }
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<Document>, B::Error> {
        check_key::<B::Error>(key)?;
        let table = self.table();
        let found = self
            .backend
            .transaction(|tx| tx.execute(&Statement::SelectOne { table, id: key }))
            .map_err(StoreError::Backend)?;

        debug!(target: "lawnchair::store", table, key, hit = !found.rows.is_empty(), "get");
        found.rows.into_iter().next().map(into_document).transpose()
    }

    fn persist(&self, doc: &mut Document) -> Result<String, B::Error> {
        let existing = match doc.raw_key() {
            None => None,
            Some(Value::String(key)) => {
                check_key::<B::Error>(key)?;
                Some(key.clone())
            }
            Some(other) => return Err(StoreError::InvalidKey(other.to_string())),
        };

        let value = codec::serialize(doc).map_err(StoreError::<B::Error>::Serialize)?;
        let timestamp = now_ms();
        let table = self.table();

        match existing {
            Some(id) => {
                // A single conditional UPDATE: no separate existence probe
                // that another writer could invalidate.
                let result = self
                    .backend
                    .transaction(|tx| {
                        tx.execute(&Statement::Update {
                            table,
                            id: &id,
                            value: &value,
                            timestamp,
                        })
                    })
                    .map_err(StoreError::Backend)?;
                if result.rows_affected == 0 {
                    return Err(StoreError::NotFound(id));
                }
                debug!(target: "lawnchair::store", table, key = %id, "updated document");
                Ok(id)
            }
            None => {
                let record = Record {
                    id: id::uuid(),
                    value,
                    timestamp,
                };
                self.backend
                    .transaction(|tx| {
                        tx.execute(&Statement::Insert {
                            table,
                            record: &record,
                        })
                    })
                    .map_err(StoreError::Backend)?;
                debug!(target: "lawnchair::store", table, key = %record.id, "inserted document");
                doc.set_key(record.id.clone());
                Ok(record.id)
            }
        }
    }

    fn delete(&self, key: Option<&str>) -> Result<usize, B::Error> {
        let key = key.ok_or(StoreError::<B::Error>::MissingKey)?;
        check_key::<B::Error>(key)?;
        let table = self.table();
        let result = self
            .backend
            .transaction(|tx| tx.execute(&Statement::Delete { table, id: key }))
            .map_err(StoreError::Backend)?;
        debug!(target: "lawnchair::store", table, key, removed = result.rows_affected, "remove");
        Ok(result.rows_affected)
    }

    fn scan(&self) -> Result<Vec<Document>, B::Error> {
        let table = self.table();
        let result = self
            .backend
            .transaction(|tx| tx.execute(&Statement::SelectAll { table }))
            .map_err(StoreError::Backend)?;
        debug!(target: "lawnchair::store", table, rows = result.rows.len(), "scan");
        result.rows.into_iter().map(into_document).collect()
    }

    /// Route a failed result through logging and the error hook.
    fn observe<T>(&self, op: Operation, result: Result<T, B::Error>) -> Result<T, B::Error> {
        if let Err(err) = &result {
            warn!(
                target: "lawnchair::store",
                operation = %op,
                table = %self.table(),
                error = %err,
                "operation failed"
            );
            (self.on_error)(op, err);
        }
        result
    }
}

fn check_key<E>(key: &str) -> Result<(), E> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(Value::from(key).to_string()));
    }
    Ok(())
}

fn into_document<E>(record: Record) -> Result<Document, E> {
    let mut doc = codec::deserialize(&record.value).map_err(|source| StoreError::<E>::Deserialize {
        id: record.id.clone(),
        source,
    })?;
    // The record id wins over any `key` left inside an old body.
    doc.set_key(record.id);
    Ok(doc)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
