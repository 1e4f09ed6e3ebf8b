use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::SqlBindingError;
use crate::results::{ColumnIndex, ColumnMap, ResultSet, Row};
use crate::types::RowValues;

use super::connection::ConnectionState;
use super::function::StatementId;
use super::params::bind_values;
use super::query::{build_result_set, native_to_row_value};
use super::raw::{RawStatement, Step};

/// Where a statement's cursor stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Bound (or never stepped) and not yet advanced.
    Unstepped,
    /// A current row is available.
    Positioned,
    /// The result set has been consumed.
    Exhausted,
    /// The native handle has been released.
    Disposed,
}

/// One compiled SQL command and its cursor.
///
/// The statement exclusively owns its prepared handle. It keeps only a weak
/// link to its connection, used to detect a closed connection and to keep the
/// connection's liveness tracking current; it never extends the connection's
/// lifetime.
pub struct Statement {
    conn: Weak<ConnectionState>,
    id: StatementId,
    raw: Option<RawStatement>,
    sql: String,
    parameter_count: usize,
    columns: ColumnMap,
    cursor: CursorState,
    bound: bool,
}

impl Statement {
    pub(crate) fn new(
        conn: Weak<ConnectionState>,
        id: StatementId,
        raw: RawStatement,
        sql: String,
    ) -> Self {
        let parameter_count = raw.parameter_count();
        let names = (0..raw.column_count())
            .map(|i| raw.column_name(i).unwrap_or_else(|| format!("column{i}")))
            .collect();
        Self {
            conn,
            id,
            raw: Some(raw),
            sql,
            parameter_count,
            columns: ColumnMap::new(names),
            cursor: CursorState::Unstepped,
            bound: parameter_count == 0,
        }
    }

    /// Access the SQL text this statement was compiled from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_names(&self) -> std::sync::Arc<Vec<String>> {
        self.columns.names()
    }

    pub(crate) fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    #[must_use]
    pub fn cursor_state(&self) -> CursorState {
        self.cursor
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.raw.is_none()
    }

    /// Check that both the statement and its connection are still usable.
    fn ensure_usable(&self) -> Result<Rc<ConnectionState>, SqlBindingError> {
        if self.raw.is_none() {
            return Err(SqlBindingError::UseAfterClose(
                "statement has been disposed".into(),
            ));
        }
        self.conn.upgrade().ok_or_else(|| {
            SqlBindingError::UseAfterClose("connection has been closed".into())
        })
    }

    fn ensure_bound(&self) -> Result<(), SqlBindingError> {
        if self.bound {
            Ok(())
        } else {
            Err(SqlBindingError::NotBound {
                expected: self.parameter_count,
            })
        }
    }

    fn raw_mut(&mut self) -> Result<&mut RawStatement, SqlBindingError> {
        self.raw
            .as_mut()
            .ok_or_else(|| SqlBindingError::UseAfterClose("statement has been disposed".into()))
    }

    /// Move the cursor, keeping the connection's view of active statements current.
    fn set_cursor(&mut self, cursor: CursorState) {
        if (self.cursor == CursorState::Positioned) != (cursor == CursorState::Positioned) {
            if let Some(conn) = self.conn.upgrade() {
                conn.set_positioned(self.id, cursor == CursorState::Positioned);
            }
        }
        self.cursor = cursor;
    }

    /// Rewind the engine cursor if it has moved since the last bind.
    fn restart(&mut self) -> Result<(), SqlBindingError> {
        if self.cursor != CursorState::Unstepped {
            self.raw_mut()?.reset();
            self.set_cursor(CursorState::Unstepped);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<bool, SqlBindingError> {
        let raw = self.raw_mut()?;
        match raw.step() {
            Ok(Step::Row) => {
                tracing::trace!(statement = self.id, "step produced a row");
                self.set_cursor(CursorState::Positioned);
                Ok(true)
            }
            Ok(Step::Done) => {
                tracing::trace!(statement = self.id, "step reached the end");
                self.set_cursor(CursorState::Exhausted);
                Ok(false)
            }
            Err(failure) => {
                raw.reset();
                self.set_cursor(CursorState::Unstepped);
                Err(SqlBindingError::ExecutionError(failure.message))
            }
        }
    }

    /// Bind positional parameters, rewinding the cursor.
    ///
    /// The number of values must equal the number of placeholders; a
    /// statement without placeholders accepts no bind at all.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ArgumentCount` on a count mismatch,
    /// `SqlBindingError::ParameterError` if the engine rejects a value, or
    /// `SqlBindingError::UseAfterClose` once the statement or connection is gone.
    pub fn bind(&mut self, values: &[RowValues]) -> Result<&mut Self, SqlBindingError> {
        self.ensure_usable()?;
        if self.parameter_count == 0 || values.len() != self.parameter_count {
            return Err(SqlBindingError::ArgumentCount {
                expected: self.parameter_count,
                actual: values.len(),
            });
        }

        let raw = self.raw_mut()?;
        raw.reset();
        raw.clear_bindings();
        self.set_cursor(CursorState::Unstepped);
        self.bound = false;

        bind_values(self.raw_mut()?, values)?;
        self.bound = true;
        Ok(self)
    }

    /// Run the statement from its start and advance once, discarding any row.
    ///
    /// Returns the number of rows the command inserted, updated or deleted;
    /// zero for queries and schema changes.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ExecutionError` if the engine reports a failure
    /// (constraint violation, missing table, ...); the statement is rewound and
    /// can be bound again.
    pub fn execute(&mut self) -> Result<usize, SqlBindingError> {
        let conn = self.ensure_usable()?;
        self.ensure_bound()?;
        self.restart()?;
        let before = conn.raw.total_changes();
        self.step()?;
        if conn.raw.total_changes() == before {
            return Ok(0);
        }
        Ok(usize::try_from(conn.raw.changes()).unwrap_or(0))
    }

    /// Advance one row. Returns `false` once exhausted, and keeps returning
    /// `false` until the statement is bound or executed again.
    ///
    /// # Errors
    /// Returns `SqlBindingError::NotBound` if placeholders have not been bound,
    /// or `SqlBindingError::ExecutionError` on engine failure.
    pub fn read(&mut self) -> Result<bool, SqlBindingError> {
        self.ensure_usable()?;
        self.ensure_bound()?;
        if self.cursor == CursorState::Exhausted {
            return Ok(false);
        }
        self.step()
    }

    /// Advance one row and return it. This never rewinds: calling it again
    /// yields the following row, and `None` once the result is exhausted.
    ///
    /// # Errors
    /// Same as [`Statement::read`].
    pub fn first(&mut self) -> Result<Option<Row<'_>>, SqlBindingError> {
        if self.read()? {
            Ok(Some(Row::new(self)))
        } else {
            Ok(None)
        }
    }

    /// View of the current row.
    ///
    /// # Errors
    /// Returns `SqlBindingError::NoCurrentRow` unless the last step produced a row.
    pub fn current_row(&self) -> Result<Row<'_>, SqlBindingError> {
        self.ensure_usable()?;
        if self.cursor == CursorState::Positioned {
            Ok(Row::new(self))
        } else {
            Err(SqlBindingError::NoCurrentRow)
        }
    }

    /// Value of the current row at an ordinal or (case-insensitive) column name.
    ///
    /// # Errors
    /// Returns `SqlBindingError::NoCurrentRow` without a current row, or
    /// `SqlBindingError::InvalidColumn` for an unknown column.
    pub fn get<I: ColumnIndex>(&self, idx: I) -> Result<RowValues, SqlBindingError> {
        self.ensure_usable()?;
        if self.cursor != CursorState::Positioned {
            return Err(SqlBindingError::NoCurrentRow);
        }
        let idx = idx.column_index(&self.columns)?;
        let raw = self
            .raw
            .as_ref()
            .ok_or_else(|| SqlBindingError::UseAfterClose("statement has been disposed".into()))?;
        Ok(native_to_row_value(raw.column_value(idx)))
    }

    /// Run from the start and return column 0 of the first row.
    ///
    /// Yields `RowValues::Null` for an empty result. The statement is rewound
    /// afterwards, so it can be queried again without rebinding.
    ///
    /// # Errors
    /// Same as [`Statement::execute`].
    pub fn query_scalar(&mut self) -> Result<RowValues, SqlBindingError> {
        self.ensure_usable()?;
        self.ensure_bound()?;
        self.restart()?;
        let value = if self.step()? && self.column_count() > 0 {
            self.get(0usize)?
        } else {
            RowValues::Null
        };
        self.restart()?;
        Ok(value)
    }

    /// Materialize every remaining row.
    ///
    /// # Errors
    /// Same as [`Statement::read`].
    pub fn collect_rows(&mut self) -> Result<ResultSet, SqlBindingError> {
        build_result_set(self)
    }

    /// Release the native handle. Safe to call repeatedly and after the
    /// connection has been closed.
    pub fn dispose(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };
        drop(raw);
        self.cursor = CursorState::Disposed;
        if let Some(conn) = self.conn.upgrade() {
            conn.release_statement(self.id);
        }
        tracing::debug!(statement = self.id, "statement disposed");
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("sql", &self.sql)
            .field("parameter_count", &self.parameter_count)
            .field("cursor", &self.cursor)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}
