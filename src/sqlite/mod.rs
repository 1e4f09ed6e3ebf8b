// SQLite module - the native binding over the embedded engine
//
// This module is split into several sub-modules for better organization:
// - raw: the only place FFI calls into the engine are made
// - config: Connection options and builder
// - params: Parameter conversion from middleware values to engine values
// - query: Column value extraction and result building
// - statement: Prepared statements and their cursors
// - function: Scalar functions implemented in Rust
// - connection: The connection and its operations

pub mod config;
pub mod connection;
pub mod function;
mod params;
pub mod query;
mod raw;
mod scanner;
pub mod statement;

// Re-export the public API
pub use config::{ConnectionOptions, ConnectionOptionsBuilder, JournalMode, MEMORY_PATH};
pub use connection::Connection;
pub use function::{Arity, FunctionDescriptor, MAX_FUNCTION_ARGS, ScalarFunction};
pub use query::build_result_set;
pub use statement::{CursorState, Statement};
