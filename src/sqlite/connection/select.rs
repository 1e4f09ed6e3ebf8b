use crate::error::SqlBindingError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::Connection;
use super::dml::bind_if_needed;

impl Connection {
    /// Compile, bind and materialize every row of a query.
    ///
    /// # Errors
    /// Returns `SqlBindingError` if compilation, binding or stepping fails.
    pub fn select(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlBindingError> {
        let mut stmt = self.create_statement(sql)?;
        bind_if_needed(&mut stmt, params)?;
        stmt.collect_rows()
    }

    /// Column 0 of the first row, or `RowValues::Null` for an empty result.
    ///
    /// # Errors
    /// Returns `SqlBindingError` if compilation, binding or stepping fails.
    pub fn query_scalar(&self, sql: &str, params: &[RowValues]) -> Result<RowValues, SqlBindingError> {
        let mut stmt = self.create_statement(sql)?;
        bind_if_needed(&mut stmt, params)?;
        stmt.query_scalar()
    }

    /// Whether a table named `table` exists (case-insensitive).
    ///
    /// # Errors
    /// Returns `SqlBindingError` if the catalog query fails.
    pub fn table_exists(&self, table: &str) -> Result<bool, SqlBindingError> {
        let count = self.query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
            &[RowValues::Text(table.to_string())],
        )?;
        Ok(count.as_int().is_some_and(|n| *n > 0))
    }

    /// Whether `table` has a column named `column` (case-insensitive).
    ///
    /// # Errors
    /// Returns `SqlBindingError` if the catalog query fails.
    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool, SqlBindingError> {
        let count = self.query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ? COLLATE NOCASE",
            &[
                RowValues::Text(table.to_string()),
                RowValues::Text(column.to_string()),
            ],
        )?;
        Ok(count.as_int().is_some_and(|n| *n > 0))
    }
}
