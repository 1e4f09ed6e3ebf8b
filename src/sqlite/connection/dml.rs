use crate::error::SqlBindingError;
use crate::sqlite::statement::Statement;
use crate::types::RowValues;

use super::Connection;

/// Bind `params` unless the statement takes none and none were given.
pub(super) fn bind_if_needed(
    stmt: &mut Statement,
    params: &[RowValues],
) -> Result<(), SqlBindingError> {
    if params.is_empty() && stmt.parameter_count() == 0 {
        return Ok(());
    }
    stmt.bind(params)?;
    Ok(())
}

impl Connection {
    /// Compile, bind and run a single data-changing command.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    /// Returns `SqlBindingError` if compilation, binding or execution fails.
    pub fn execute(&self, sql: &str, params: &[RowValues]) -> Result<usize, SqlBindingError> {
        let mut stmt = self.create_statement(sql)?;
        bind_if_needed(&mut stmt, params)?;
        stmt.execute()
    }

    /// Rowid of the most recent successful insert on this connection.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.state.raw.last_insert_rowid()
    }

    /// Rows changed by the most recent data-changing command.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(self.state.raw.changes()).unwrap_or(0)
    }
}
