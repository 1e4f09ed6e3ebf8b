use thiserror::Error;

/// Message reported when a function is removed while statements that may call it are alive.
pub const FUNCTION_CONFLICT_MESSAGE: &str =
    "Unable to delete/modify user-function due to active statements";

#[derive(Debug, Error)]
pub enum SqlBindingError {
    #[error("SQL compile error: {0}")]
    CompileError(String),

    #[error("Statement expects {expected} parameter(s) but {actual} were bound")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Statement has {expected} unbound parameter(s); call bind first")]
    NotBound { expected: usize },

    #[error("No current row; read a row before accessing columns")]
    NoCurrentRow,

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Display is the bare message so callers can compare it verbatim.
    #[error("{0}")]
    FunctionRegistrationConflict(String),

    #[error("Use after close: {0}")]
    UseAfterClose(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Function error: {0}")]
    FunctionError(String),
}

impl From<serde_json::Error> for SqlBindingError {
    fn from(err: serde_json::Error) -> Self {
        SqlBindingError::ConfigError(format!("invalid connection options: {err}"))
    }
}
