//! Durable key-value storage contracts and implementations.
//!
//! # Responsibility
//! - Provide a string key -> string value storage seam for store snapshots.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `set_value` replaces the whole value for a key in one statement.
//! - Keys are non-blank; blank keys are rejected before touching storage.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use rusqlite::{params, Connection};
use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage error for key-value reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidKey(String),
    /// The connection was not opened through `open_db`/`open_db_in_memory`.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "storage connection is at schema version {actual_version}, expected {expected_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidKey(_) | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable key-value storage used for store snapshots.
pub trait KeyValueRepository {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>>;
    fn set_value(&self, key: &str, value: &str) -> RepoResult<()>;
}

impl<R: KeyValueRepository + ?Sized> KeyValueRepository for &R {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>> {
        (**self).get_value(key)
    }

    fn set_value(&self, key: &str, value: &str) -> RepoResult<()> {
        (**self).set_value(key, value)
    }
}

/// SQLite-backed key-value repository over the `kv_store` table.
pub struct SqliteKeyValueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKeyValueRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = schema_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl KeyValueRepository for SqliteKeyValueRepository<'_> {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>> {
        ensure_key(key)?;

        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv_store WHERE key = ?1;")?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }

        Ok(None)
    }

    fn set_value(&self, key: &str, value: &str) -> RepoResult<()> {
        ensure_key(key)?;

        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;

        Ok(())
    }
}

/// Process-local repository. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryKeyValueRepository {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryKeyValueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-seeded with one key.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let repo = Self::new();
        repo.values.borrow_mut().insert(key.into(), value.into());
        repo
    }
}

impl KeyValueRepository for MemoryKeyValueRepository {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>> {
        ensure_key(key)?;
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> RepoResult<()> {
        ensure_key(key)?;
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn ensure_key(key: &str) -> RepoResult<()> {
    if key.trim().is_empty() {
        return Err(RepoError::InvalidKey(key.to_string()));
    }
    Ok(())
}
