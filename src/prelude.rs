//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::error::{FUNCTION_CONFLICT_MESSAGE, SqlBindingError};
pub use crate::params;
pub use crate::results::{ColumnIndex, CustomDbRow, ResultSet, Row};
pub use crate::sqlite::{
    Arity, Connection, ConnectionOptions, ConnectionOptionsBuilder, CursorState,
    FunctionDescriptor, JournalMode, ScalarFunction, Statement,
};
pub use crate::types::RowValues;
