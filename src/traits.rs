use std::error::Error as StdError;

/// The persisted form of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Unique identifier within the table; the document's `key`.
    pub id: String,
    /// Serialized document body, `key` excluded.
    pub value: String,
    /// Last write time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A parameterized statement against one table.
///
/// Backends translate these into whatever their engine speaks. The store
/// never builds statement text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement<'a> {
    /// Cheap existence check. Fails if the table does not exist.
    Probe { table: &'a str },
    /// Create the `(id, value, timestamp)` table. Fails if it already exists.
    CreateTable { table: &'a str },
    /// Fetch at most one record by id.
    SelectOne { table: &'a str, id: &'a str },
    /// Fetch every record in scan order.
    SelectAll { table: &'a str },
    /// Add a record. Fails if the id is already taken.
    Insert { table: &'a str, record: &'a Record },
    /// Overwrite value and timestamp of an existing record.
    /// Affects zero rows when the id is absent.
    Update {
        table: &'a str,
        id: &'a str,
        value: &'a str,
        timestamp: i64,
    },
    /// Delete one record by id.
    Delete { table: &'a str, id: &'a str },
    /// Delete every record in the table.
    DeleteAll { table: &'a str },
}

impl Statement<'_> {
    /// The table this statement targets.
    pub fn table(&self) -> &str {
        match self {
            Self::Probe { table }
            | Self::CreateTable { table }
            | Self::SelectOne { table, .. }
            | Self::SelectAll { table }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. }
            | Self::DeleteAll { table } => *table,
        }
    }
}

/// Outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Rows returned by a select. Empty for writes.
    pub rows: Vec<Record>,
    /// Rows changed by a write. Zero for selects.
    pub rows_affected: usize,
}

impl ResultSet {
    /// A result carrying rows.
    pub fn rows(rows: Vec<Record>) -> Self {
        Self {
            rows,
            rows_affected: 0,
        }
    }

    /// A result of a write that touched `n` rows.
    pub fn affected(n: usize) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected: n,
        }
    }
}

/// Executes statements inside an open transaction.
pub trait Executor {
    /// Error type for this backend.
    type Error;

    /// Run one statement.
    fn execute(&mut self, statement: &Statement<'_>) -> Result<ResultSet, Self::Error>;
}

/// A transactional storage engine.
///
/// Every [`DocumentStore`](crate::DocumentStore) operation runs inside
/// exactly one call to [`Backend::transaction`]. Implementations must apply
/// either all statements of a transaction or none of them, and must
/// serialize transactions that touch the same data.
pub trait Backend: Send + Sync {
    /// Error type for this backend.
    type Error: StdError + Send + Sync + 'static;

    /// Execute a closure within an atomic transaction.
    /// If the closure returns `Err`, all changes are rolled back.
    fn transaction<F, R>(&self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut dyn Executor<Error = Self::Error>) -> Result<R, Self::Error>;
}
