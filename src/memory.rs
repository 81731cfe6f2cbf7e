use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::traits::{Backend, Executor, Record, ResultSet, Statement};

type Tables = BTreeMap<String, Vec<Record>>;

/// In-memory storage backend.
///
/// Tables live in a `BTreeMap` behind a `Mutex`; nothing touches disk.
/// Records keep insertion order, which is also the scan order.
/// Ideal for testing and prototyping.
///
/// # Example
///
/// ```
/// use lawnchair::{DocumentStore, MemoryBackend};
/// use serde_json::json;
///
/// let store = DocumentStore::open(MemoryBackend::new()).unwrap();
/// let mut doc = lawnchair::Document::from_value(json!({"temp": 22.5})).unwrap();
/// let key = store.save(&mut doc).unwrap();
///
/// assert_eq!(store.backend().len(store.table()), 1);
/// assert!(store.backend().record(store.table(), &key).is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
}

/// Error type for the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The statement referenced a table that was never created.
    #[error("no such table: {0}")]
    NoSuchTable(String),
    /// `CreateTable` on a table that already exists.
    #[error("table {0} already exists")]
    TableExists(String),
    /// An insert reused an id.
    #[error("UNIQUE constraint failed: {table}.id = {id}")]
    UniqueViolation {
        /// Table of the conflicting insert.
        table: String,
        /// The duplicated id.
        id: String,
    },
    /// A previous transaction panicked while holding the lock.
    #[error("memory backend lock poisoned")]
    LockPoisoned,
}

impl MemoryBackend {
    /// Create a new backend with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, MemoryError> {
        self.tables.lock().map_err(|_| MemoryError::LockPoisoned)
    }

    /// Returns a copy of the record stored under `id`, if any.
    pub fn record(&self, table: &str, id: &str) -> Option<Record> {
        let tables = self.lock().ok()?;
        tables.get(table)?.iter().find(|r| r.id == id).cloned()
    }

    /// Returns the number of records in `table` (0 if it does not exist).
    pub fn len(&self, table: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|t| t.get(table).map(Vec::len))
            .unwrap_or(0)
    }

    /// Returns the names of all created tables.
    pub fn table_names(&self) -> Vec<String> {
        self.lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A transaction's private copy of the tables.
struct MemoryTx {
    tables: Tables,
}

impl MemoryTx {
    fn table(&self, name: &str) -> Result<&Vec<Record>, MemoryError> {
        self.tables
            .get(name)
            .ok_or_else(|| MemoryError::NoSuchTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Vec<Record>, MemoryError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| MemoryError::NoSuchTable(name.to_string()))
    }
}

impl Executor for MemoryTx {
    type Error = MemoryError;

    fn execute(&mut self, statement: &Statement<'_>) -> Result<ResultSet, Self::Error> {
        match *statement {
            Statement::Probe { table } => {
                self.table(table)?;
                Ok(ResultSet::default())
            }
            Statement::CreateTable { table } => {
                if self.tables.contains_key(table) {
                    return Err(MemoryError::TableExists(table.to_string()));
                }
                self.tables.insert(table.to_string(), Vec::new());
                Ok(ResultSet::default())
            }
            Statement::SelectOne { table, id } => {
                let rows = self
                    .table(table)?
                    .iter()
                    .filter(|r| r.id == id)
                    .take(1)
                    .cloned()
                    .collect();
                Ok(ResultSet::rows(rows))
            }
            Statement::SelectAll { table } => Ok(ResultSet::rows(self.table(table)?.clone())),
            Statement::Insert { table, record } => {
                let rows = self.table_mut(table)?;
                if rows.iter().any(|r| r.id == record.id) {
                    return Err(MemoryError::UniqueViolation {
                        table: table.to_string(),
                        id: record.id.clone(),
                    });
                }
                rows.push(record.clone());
                Ok(ResultSet::affected(1))
            }
            Statement::Update {
                table,
                id,
                value,
                timestamp,
            } => {
                let rows = self.table_mut(table)?;
                match rows.iter_mut().find(|r| r.id == id) {
                    Some(row) => {
                        row.value = value.to_string();
                        row.timestamp = timestamp;
                        Ok(ResultSet::affected(1))
                    }
                    None => Ok(ResultSet::affected(0)),
                }
            }
            Statement::Delete { table, id } => {
                let rows = self.table_mut(table)?;
                let before = rows.len();
                rows.retain(|r| r.id != id);
                Ok(ResultSet::affected(before - rows.len()))
            }
            Statement::DeleteAll { table } => {
                let rows = self.table_mut(table)?;
                let removed = rows.len();
                rows.clear();
                Ok(ResultSet::affected(removed))
            }
        }
    }
}

impl Backend for MemoryBackend {
    type Error = MemoryError;

    fn transaction<F, R>(&self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut dyn Executor<Error = Self::Error>) -> Result<R, Self::Error>,
    {
        let mut tables = self.lock()?;
        let mut tx = MemoryTx {
            tables: tables.clone(),
        };
        let result = f(&mut tx)?;
        *tables = tx.tables;
        Ok(result)
    }
}
