use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::error::SqlBindingError;
use crate::sqlite::Statement;
use crate::types::RowValues;

/// Column names of a compiled statement with a case-insensitive name index.
///
/// Built once per compiled statement; the metadata does not change across
/// bind/execute cycles, so every row and result set shares the same map.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl ColumnMap {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated names.
            index.entry(name.to_lowercase()).or_insert(i);
        }
        Self {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    #[must_use]
    pub fn names(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.names)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ordinal of `name`, compared case-insensitively.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    #[must_use]
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }
}

/// Anything that can select a column: a 0-based ordinal or a column name.
pub trait ColumnIndex {
    /// Resolve to an ordinal within `columns`.
    ///
    /// # Errors
    /// Returns `SqlBindingError::InvalidColumn` if the column does not exist.
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlBindingError>;
}

impl ColumnIndex for usize {
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlBindingError> {
        if *self < columns.len() {
            Ok(*self)
        } else {
            Err(SqlBindingError::InvalidColumn(format!(
                "ordinal {self} is out of range for {} column(s)",
                columns.len()
            )))
        }
    }
}

impl ColumnIndex for &str {
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlBindingError> {
        columns
            .position(self)
            .ok_or_else(|| SqlBindingError::InvalidColumn(format!("no column named {self:?}")))
    }
}

/// Borrowed view of a statement's current row.
///
/// The view holds a shared borrow of its statement, and `read`, `bind` and
/// `dispose` all take the statement mutably, so a row cannot outlive the step
/// it was taken from.
#[derive(Debug, Clone, Copy)]
pub struct Row<'stmt> {
    stmt: &'stmt Statement,
}

impl<'stmt> Row<'stmt> {
    pub(crate) fn new(stmt: &'stmt Statement) -> Self {
        Self { stmt }
    }

    /// Value at an ordinal or (case-insensitive) column name.
    ///
    /// # Errors
    /// Returns `SqlBindingError::InvalidColumn` for an unknown column, or
    /// `SqlBindingError::UseAfterClose` if the connection closed meanwhile.
    pub fn get<I: ColumnIndex>(&self, idx: I) -> Result<RowValues, SqlBindingError> {
        self.stmt.get(idx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stmt.column_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn column_names(&self) -> Arc<Vec<String>> {
        self.stmt.columns().names()
    }

    /// All values of the row, in column order.
    ///
    /// # Errors
    /// Returns `SqlBindingError` if the statement can no longer be read.
    pub fn values(&self) -> Result<Vec<RowValues>, SqlBindingError> {
        (0..self.len()).map(|i| self.stmt.get(i)).collect()
    }

    /// Copy the row out so it survives the next step.
    ///
    /// # Errors
    /// Returns `SqlBindingError` if the statement can no longer be read.
    pub fn to_owned_row(&self) -> Result<CustomDbRow, SqlBindingError> {
        Ok(CustomDbRow::with_columns(self.stmt.columns().clone(), self.values()?))
    }
}

/// A materialized row, detached from its statement.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    columns: ColumnMap,
}

impl CustomDbRow {
    /// Create a new row from column names and values.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        Self::with_columns(ColumnMap::new(column_names.as_ref().clone()), rows)
    }

    pub(crate) fn with_columns(columns: ColumnMap, rows: Vec<RowValues>) -> Self {
        Self {
            column_names: columns.names(),
            rows,
            columns,
        }
    }

    /// Get the index of a column by name (case-insensitive).
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.position(column_name)
    }

    /// Get a value from the row by column name.
    ///
    /// Returns `None` if the column wasn't found.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Render as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut object = Map::with_capacity(self.rows.len());
        for (name, value) in self.column_names.iter().zip(&self.rows) {
            object.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(object)
    }
}
