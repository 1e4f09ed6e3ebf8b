use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::error::SqlBindingError;
use crate::sqlite::config::{ConnectionOptions, MEMORY_PATH};
use crate::sqlite::function::{FunctionRegistry, StatementId};
use crate::sqlite::raw::RawConnection;
use crate::sqlite::scanner::trailing_command;
use crate::sqlite::statement::Statement;

/// State shared between a connection and the weak links held by its statements.
pub(crate) struct ConnectionState {
    pub(crate) raw: RawConnection,
    pub(crate) functions: RefCell<FunctionRegistry>,
    live: RefCell<BTreeSet<StatementId>>,
    /// Statements stopped on a row; the engine counts them as active.
    positioned: RefCell<BTreeSet<StatementId>>,
    next_statement: Cell<StatementId>,
    path: String,
}

impl ConnectionState {
    fn track_statement(&self) -> StatementId {
        let id = self.next_statement.get();
        self.next_statement.set(id + 1);
        self.live.borrow_mut().insert(id);
        self.functions.borrow_mut().track_statement(id);
        id
    }

    pub(crate) fn release_statement(&self, id: StatementId) {
        self.live.borrow_mut().remove(&id);
        self.positioned.borrow_mut().remove(&id);
        self.functions.borrow_mut().release_statement(id);
    }

    pub(crate) fn set_positioned(&self, id: StatementId, positioned: bool) {
        let mut set = self.positioned.borrow_mut();
        if positioned {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    pub(crate) fn has_positioned_statements(&self) -> bool {
        !self.positioned.borrow().is_empty()
    }
}

/// An open database connection.
///
/// Owns the native handle, the set of live statements and the function
/// registry. Statements compiled here may be stepped in any interleaving.
/// Dropping (or [`Connection::close`]) releases the handle; outstanding
/// statements then fail with `SqlBindingError::UseAfterClose`, and disposing
/// them remains safe.
pub struct Connection {
    pub(crate) state: Rc<ConnectionState>,
}

impl Connection {
    /// Open (creating if needed) the database at `path`. `":memory:"` opens a
    /// private in-memory database.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ConnectionError` if the engine cannot open it.
    pub fn open(path: impl Into<String>) -> Result<Self, SqlBindingError> {
        Self::open_with(ConnectionOptions::new(path.into()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ConnectionError` if the engine cannot open it.
    pub fn open_in_memory() -> Result<Self, SqlBindingError> {
        Self::open(MEMORY_PATH)
    }

    /// Open with explicit options, applying busy timeout and pragmas.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ConnectionError` if opening fails, or
    /// `SqlBindingError::ConfigError` if an option cannot be applied.
    pub fn open_with(opts: ConnectionOptions) -> Result<Self, SqlBindingError> {
        let path = if opts.db_path.is_empty() {
            MEMORY_PATH.to_string()
        } else {
            opts.db_path.clone()
        };
        let raw = RawConnection::open(&path, opts.open_flags()).map_err(|failure| {
            SqlBindingError::ConnectionError(format!(
                "failed to open {path}: {}",
                failure.message
            ))
        })?;
        if let Some(millis) = opts.busy_timeout()? {
            raw.busy_timeout(millis).map_err(|failure| {
                SqlBindingError::ConfigError(format!("busy timeout: {}", failure.message))
            })?;
        }

        let conn = Connection {
            state: Rc::new(ConnectionState {
                raw,
                functions: RefCell::new(FunctionRegistry::default()),
                live: RefCell::new(BTreeSet::new()),
                positioned: RefCell::new(BTreeSet::new()),
                next_statement: Cell::new(1),
                path,
            }),
        };
        conn.apply_pragmas(&opts)?;
        tracing::debug!(path = %conn.path(), read_only = opts.read_only, "sqlite connection opened");
        Ok(conn)
    }

    fn apply_pragmas(&self, opts: &ConnectionOptions) -> Result<(), SqlBindingError> {
        if let Some(mode) = opts.journal_mode {
            self.create_statement(&format!("PRAGMA journal_mode = {}", mode.as_pragma()))?
                .execute()
                .map_err(|e| SqlBindingError::ConfigError(format!("journal mode: {e}")))?;
        }
        if opts.foreign_keys {
            self.create_statement("PRAGMA foreign_keys = ON")?
                .execute()
                .map_err(|e| SqlBindingError::ConfigError(format!("foreign keys: {e}")))?;
        }
        Ok(())
    }

    /// Compile exactly one SQL command.
    ///
    /// # Errors
    /// Returns `SqlBindingError::CompileError` if the text is invalid, holds no
    /// command, or holds more than one command.
    pub fn create_statement(&self, sql: &str) -> Result<Statement, SqlBindingError> {
        let (raw, tail) = self
            .state
            .raw
            .prepare(sql)
            .map_err(|failure| SqlBindingError::CompileError(failure.message))?;
        let Some(raw) = raw else {
            return Err(SqlBindingError::CompileError(
                "SQL text contains no command".into(),
            ));
        };
        if let Some(rest) = sql.get(tail..).and_then(trailing_command) {
            return Err(SqlBindingError::CompileError(format!(
                "only one command can be compiled per statement; unexpected text: {rest}"
            )));
        }

        let id = self.state.track_statement();
        tracing::debug!(statement = id, sql, "statement compiled");
        Ok(Statement::new(Rc::downgrade(&self.state), id, raw, sql.to_string()))
    }

    /// Compile a statement to be stepped with [`Statement::read`].
    ///
    /// # Errors
    /// Same as [`Connection::create_statement`].
    pub fn query(&self, sql: &str) -> Result<Statement, SqlBindingError> {
        self.create_statement(sql)
    }

    /// Path this connection was opened with.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.state.path
    }

    /// Number of compiled statements not yet disposed.
    #[must_use]
    pub fn live_statement_count(&self) -> usize {
        self.state.live.borrow().len()
    }

    /// Release the native handle.
    ///
    /// Statements still alive keep their prepared handles until disposed; the
    /// engine frees the database once the last of them is finalized.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let outstanding = self.live_statement_count();
        if outstanding > 0 {
            tracing::debug!(
                path = %self.path(),
                outstanding,
                "closing connection with undisposed statements"
            );
        } else {
            tracing::debug!(path = %self.path(), "closing connection");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path())
            .field("live_statements", &self.live_statement_count())
            .field("functions", &self.state.functions.borrow().len())
            .finish()
    }
}
