use crate::error::SqlBindingError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::raw::NativeValue;
use super::statement::Statement;

/// Convert an engine cell (column or function argument) into a `RowValues`.
#[must_use]
pub(crate) fn native_to_row_value(value: NativeValue<'_>) -> RowValues {
    match value {
        NativeValue::Null => RowValues::Null,
        NativeValue::Integer(i) => RowValues::Int(i),
        NativeValue::Real(f) => RowValues::Float(f),
        NativeValue::Text(s) => RowValues::Text(s.into_owned()),
        NativeValue::Blob(b) => RowValues::Blob(b.to_vec()),
    }
}

/// Drain the remaining rows of `stmt` into a `ResultSet`.
///
/// Rows already consumed by `read` are not revisited; a freshly bound statement
/// yields its full result.
///
/// # Errors
/// Returns `SqlBindingError` if stepping or value extraction fails.
pub fn build_result_set(stmt: &mut Statement) -> Result<ResultSet, SqlBindingError> {
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_columns(stmt.columns().clone());

    while stmt.read()? {
        let row = stmt.current_row()?;
        result_set.add_row_values(row.values()?);
    }

    Ok(result_set)
}
