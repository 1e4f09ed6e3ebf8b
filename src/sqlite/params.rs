use std::borrow::Cow;

use crate::error::SqlBindingError;
use crate::types::RowValues;

use super::raw::{NativeValue, RawStatement};

/// Convert a single `RowValues` into the engine's bound representation.
///
/// Borrowed text and blobs are passed through; timestamps and JSON are
/// formatted into owned text.
#[must_use]
pub(crate) fn row_value_to_native(value: &RowValues) -> NativeValue<'_> {
    match value {
        RowValues::Int(i) => NativeValue::Integer(*i),
        RowValues::Float(f) => NativeValue::Real(*f),
        RowValues::Text(s) => NativeValue::Text(Cow::Borrowed(s.as_str())),
        RowValues::Bool(b) => NativeValue::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => NativeValue::Text(Cow::Owned(dt.format("%F %T%.f").to_string())),
        RowValues::Null => NativeValue::Null,
        RowValues::JSON(jval) => NativeValue::Text(Cow::Owned(jval.to_string())),
        RowValues::Blob(bytes) => NativeValue::Blob(bytes.as_slice()),
    }
}

/// Bind `values` to placeholders `1..=values.len()`.
///
/// # Errors
///
/// Returns `SqlBindingError::ParameterError` if the engine rejects a value.
pub(crate) fn bind_values(
    stmt: &mut RawStatement,
    values: &[RowValues],
) -> Result<(), SqlBindingError> {
    for (offset, value) in values.iter().enumerate() {
        let position = offset + 1;
        stmt.bind(position, &row_value_to_native(value))
            .map_err(|failure| {
                SqlBindingError::ParameterError(format!(
                    "cannot bind parameter {position}: {}",
                    failure.message
                ))
            })?;
    }
    Ok(())
}
