//! Row access: borrowed views over a statement's current step and owned,
//! materialized rows for callers that keep data past the next step.

mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::{ColumnIndex, ColumnMap, CustomDbRow, Row};
