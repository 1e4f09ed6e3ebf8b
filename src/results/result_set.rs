use std::sync::Arc;

use super::row::{ColumnMap, CustomDbRow};
use crate::types::RowValues;

/// Materialized rows of a query.
///
/// All rows share one `ColumnMap`, so name lookups are resolved against a
/// single index rather than one per row.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Number of rows collected
    pub rows_affected: usize,
    columns: Option<ColumnMap>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            columns: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.columns = Some(ColumnMap::new(column_names.as_ref().clone()));
    }

    pub(crate) fn set_columns(&mut self, columns: ColumnMap) {
        self.columns = Some(columns);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<Arc<Vec<String>>> {
        self.columns.as_ref().map(ColumnMap::names)
    }

    /// Add a row to the result set.
    ///
    /// Rows added before column names are set are ignored.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let Some(columns) = &self.columns {
            self.results
                .push(CustomDbRow::with_columns(columns.clone(), row_values));
            self.rows_affected += 1;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
