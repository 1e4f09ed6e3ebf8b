use std::ffi::c_int;
use std::time::Duration;

use clap::ValueEnum;
use rusqlite::ffi;
use serde::{Deserialize, Serialize};

use crate::error::SqlBindingError;

use super::connection::Connection;

/// Path that opens a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Journal mode applied with `PRAGMA journal_mode` after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    #[must_use]
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

/// Options for opening a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    pub db_path: String,
    pub read_only: bool,
    pub create_if_missing: bool,
    pub busy_timeout_ms: Option<u64>,
    pub journal_mode: Option<JournalMode>,
    pub foreign_keys: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new(MEMORY_PATH.to_string())
    }
}

impl ConnectionOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            read_only: false,
            create_if_missing: true,
            busy_timeout_ms: None,
            journal_mode: None,
            foreign_keys: false,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Parse options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ConfigError` if the JSON does not describe options.
    pub fn from_json(json: &str) -> Result<Self, SqlBindingError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.db_path == MEMORY_PATH || self.db_path.is_empty()
    }

    pub(crate) fn open_flags(&self) -> c_int {
        let access = if self.read_only {
            ffi::SQLITE_OPEN_READONLY
        } else if self.create_if_missing {
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        } else {
            ffi::SQLITE_OPEN_READWRITE
        };
        // One caller per connection, so the engine's own mutexes are skipped.
        access | ffi::SQLITE_OPEN_URI | ffi::SQLITE_OPEN_NOMUTEX
    }

    pub(crate) fn busy_timeout(&self) -> Result<Option<c_int>, SqlBindingError> {
        self.busy_timeout_ms
            .map(|ms| {
                c_int::try_from(ms).map_err(|_| {
                    SqlBindingError::ConfigError(format!("busy timeout {ms}ms is too large"))
                })
            })
            .transpose()
    }
}

/// Fluent builder for connection options.
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: ConnectionOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.opts.create_if_missing = create;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.opts.journal_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    ///
    /// Returns `SqlBindingError` if opening or applying pragmas fails.
    pub fn build(self) -> Result<Connection, SqlBindingError> {
        Connection::open_with(self.finish())
    }
}

impl Connection {
    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new(db_path.into())
    }
}
