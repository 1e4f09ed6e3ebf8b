//! Native `SQLite` binding: connections, prepared statements with positional
//! parameters, row cursors, and scalar functions implemented in Rust.
//!
//! ```rust
//! use sqlite_binding::prelude::*;
//!
//! let conn = Connection::open_in_memory()?;
//! conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", params![])?;
//!
//! let mut insert = conn.create_statement("INSERT INTO users (name) VALUES (?)")?;
//! insert.bind(params!["Gabriel"])?.execute()?;
//! insert.bind(params!["Aaron"])?.execute()?;
//!
//! let mut names = conn.query("SELECT name FROM users ORDER BY name")?;
//! let mut seen = Vec::new();
//! while names.read()? {
//!     seen.push(names.get("NAME")?);
//! }
//! assert_eq!(seen, vec![RowValues::Text("Aaron".into()), RowValues::Text("Gabriel".into())]);
//! # Ok::<(), SqlBindingError>(())
//! ```

pub mod error;
pub mod prelude;
pub mod results;
pub mod sqlite;
pub mod types;

pub use error::{FUNCTION_CONFLICT_MESSAGE, SqlBindingError};
pub use results::{ColumnIndex, CustomDbRow, ResultSet, Row};
pub use sqlite::{
    Arity, Connection, ConnectionOptions, ConnectionOptionsBuilder, CursorState,
    FunctionDescriptor, JournalMode, ScalarFunction, Statement,
};
pub use types::RowValues;
