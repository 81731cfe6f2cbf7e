//! SQLite persistence backend using rusqlite.
//!
//! This is the primary backend for edge, mobile, and desktop applications.
//! Uses WAL mode by default for concurrent read/write performance.
//!
//! # Example
//!
//! ```no_run
//! use lawnchair::{DocumentStore, SqliteBackend, StoreConfig};
//!
//! let config = StoreConfig::from("notes");
//! let backend = SqliteBackend::open_database("/var/lib/myapp", &config).unwrap();
//! let store = DocumentStore::builder(backend).config(config).build().unwrap();
//!
//! for doc in store.all().unwrap() {
//!     println!("{:?}", doc.key());
//! }
//! ```

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::store::StoreConfig;
use crate::traits::{Backend, Executor, Record, ResultSet, Statement};

/// SQLite configuration options.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// SQLite journal mode. Defaults to WAL.
    pub journal_mode: JournalMode,
    /// Busy timeout in milliseconds. Defaults to 5000.
    pub busy_timeout_ms: u32,
    /// SQLite page size. Defaults to 4096.
    pub page_size: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            busy_timeout_ms: 5000,
            page_size: 4096,
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-Ahead Logging. Allows concurrent reads during writes.
    Wal,
    /// Traditional rollback journal.
    Delete,
    /// In-memory journal (fastest, no crash recovery).
    Memory,
}

impl JournalMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }
}

/// Error type for the SQLite backend.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// An error from rusqlite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The database was created with a different schema version.
    #[error("database {name:?} is at version {found:?}, expected {expected:?}")]
    VersionMismatch {
        /// Database name.
        name: String,
        /// Version requested by the caller.
        expected: String,
        /// Version recorded in the file.
        found: String,
    },
    /// Lock poisoned.
    #[error("sqlite lock poisoned")]
    LockPoisoned,
}

/// SQLite persistence backend.
///
/// Wraps a `rusqlite::Connection` behind a `Mutex` for safe shared access.
/// Document tables are created on demand by the store.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a SQLite database at the given path with default config.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteError> {
        Self::open_with_config(path, SqliteConfig::default())
    }

    /// Open with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteConfig,
    ) -> Result<Self, SqliteError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn, &config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn, &SqliteConfig::default())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the named, versioned database described by `config` inside `dir`.
    ///
    /// The file is `<dir>/<name>.sqlite`. Its size is capped at `config.max`
    /// bytes. The first open records `version` and `display`; later opens
    /// with a different non-empty `version` fail with
    /// [`SqliteError::VersionMismatch`].
    pub fn open_database<P: AsRef<Path>>(dir: P, config: &StoreConfig) -> Result<Self, SqliteError> {
        let path = dir.as_ref().join(format!("{}.sqlite", config.name));
        let sqlite_config = SqliteConfig::default();
        let conn = Connection::open(&path)?;
        Self::init_connection(&conn, &sqlite_config)?;

        let max_pages = config.max.div_ceil(u64::from(sqlite_config.page_size)).max(1);
        conn.pragma_update(None, "max_page_count", max_pages as i64)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS lawnchair_meta (
                name    TEXT NOT NULL PRIMARY KEY,
                version TEXT NOT NULL,
                display TEXT NOT NULL
            );",
        )?;

        let recorded: Option<String> = conn
            .query_row(
                "SELECT version FROM lawnchair_meta WHERE name = ?1",
                params![config.name],
                |row| row.get(0),
            )
            .optional()?;

        match recorded {
            Some(found) if !config.version.is_empty() && found != config.version => {
                return Err(SqliteError::VersionMismatch {
                    name: config.name.clone(),
                    expected: config.version.clone(),
                    found,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO lawnchair_meta (name, version, display) VALUES (?1, ?2, ?3)",
                    params![config.name, config.version, config.display],
                )?;
            }
        }

        tracing::debug!(
            target: "lawnchair::sqlite",
            path = %path.display(),
            display = %config.display,
            max_pages,
            "opened database"
        );

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_connection(conn: &Connection, config: &SqliteConfig) -> Result<(), SqliteError> {
        conn.execute_batch(&format!(
            "PRAGMA page_size = {};
             PRAGMA journal_mode = {};
             PRAGMA busy_timeout = {};
             PRAGMA synchronous = NORMAL;",
            config.page_size,
            config.journal_mode.as_str(),
            config.busy_timeout_ms,
        ))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteError> {
        self.conn.lock().map_err(|_| SqliteError::LockPoisoned)
    }

    /// Get the current journal mode.
    pub fn journal_mode(&self) -> Result<String, SqliteError> {
        let conn = self.lock()?;
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode)
    }

    /// Get the size cap of the database in bytes.
    pub fn max_size(&self) -> Result<u64, SqliteError> {
        let conn = self.lock()?;
        let page_count: i64 = conn.query_row("PRAGMA max_page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((page_count * page_size) as u64)
    }
}

/// Quote a table name as an SQL identifier.
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// The SQL text for a statement. Values are always bound, never inlined.
fn sql(statement: &Statement<'_>) -> String {
    let table = quote(statement.table());
    match statement {
        Statement::Probe { .. } => format!("SELECT COUNT(*) FROM {table}"),
        Statement::CreateTable { .. } => format!(
            "CREATE TABLE {table} (
                id        TEXT NOT NULL UNIQUE PRIMARY KEY,
                value     TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )"
        ),
        Statement::SelectOne { .. } => {
            format!("SELECT id, value, timestamp FROM {table} WHERE id = ?1")
        }
        Statement::SelectAll { .. } => {
            format!("SELECT id, value, timestamp FROM {table} ORDER BY rowid")
        }
        Statement::Insert { .. } => {
            format!("INSERT INTO {table} (id, value, timestamp) VALUES (?1, ?2, ?3)")
        }
        Statement::Update { .. } => {
            format!("UPDATE {table} SET value = ?1, timestamp = ?2 WHERE id = ?3")
        }
        Statement::Delete { .. } => format!("DELETE FROM {table} WHERE id = ?1"),
        Statement::DeleteAll { .. } => format!("DELETE FROM {table}"),
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        value: row.get(1)?,
        timestamp: row.get(2)?,
    })
}

/// Executor over an open rusqlite transaction.
struct SqliteTx<'c> {
    conn: &'c Connection,
}

impl SqliteTx<'_> {
    fn select(&self, text: &str, id: Option<&str>) -> Result<ResultSet, SqliteError> {
        let mut stmt = self.conn.prepare_cached(text)?;
        let rows = match id {
            Some(id) => stmt
                .query_map(params![id], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(ResultSet::rows(rows))
    }
}

impl Executor for SqliteTx<'_> {
    type Error = SqliteError;

    fn execute(&mut self, statement: &Statement<'_>) -> Result<ResultSet, Self::Error> {
        let text = sql(statement);
        let affected = match *statement {
            Statement::Probe { .. } => {
                self.conn.query_row(&text, [], |row| row.get::<_, i64>(0))?;
                0
            }
            Statement::CreateTable { .. } | Statement::DeleteAll { .. } => {
                self.conn.execute(&text, [])?
            }
            Statement::SelectOne { id, .. } => return self.select(&text, Some(id)),
            Statement::SelectAll { .. } => return self.select(&text, None),
            Statement::Insert { record, .. } => self
                .conn
                .prepare_cached(&text)?
                .execute(params![record.id, record.value, record.timestamp])?,
            Statement::Update {
                id,
                value,
                timestamp,
                ..
            } => self
                .conn
                .prepare_cached(&text)?
                .execute(params![value, timestamp, id])?,
            Statement::Delete { id, .. } => {
                self.conn.prepare_cached(&text)?.execute(params![id])?
            }
        };
        Ok(ResultSet::affected(affected))
    }
}

impl Backend for SqliteBackend {
    type Error = SqliteError;

    fn transaction<F, R>(&self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut dyn Executor<Error = Self::Error>) -> Result<R, Self::Error>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        // Dropping `tx` on the error path rolls everything back.
        let result = f(&mut SqliteTx { conn: &tx })?;
        tx.commit()?;
        Ok(result)
    }
}
