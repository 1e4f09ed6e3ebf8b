use crate::error::SqlBindingError;

use super::Connection;

impl Connection {
    /// Begin a transaction.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ExecutionError` if a transaction is already active.
    pub fn begin(&self) -> Result<(), SqlBindingError> {
        if !self.is_autocommit() {
            return Err(SqlBindingError::ExecutionError(
                "SQLite transaction already in progress".into(),
            ));
        }
        self.create_statement("BEGIN")?.execute()?;
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ExecutionError` if no transaction is active or the commit fails.
    pub fn commit(&self) -> Result<(), SqlBindingError> {
        if self.is_autocommit() {
            return Err(SqlBindingError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        self.create_statement("COMMIT")?.execute()?;
        Ok(())
    }

    /// Roll back the open transaction.
    ///
    /// # Errors
    /// Returns `SqlBindingError::ExecutionError` if no transaction is active or the rollback fails.
    pub fn rollback(&self) -> Result<(), SqlBindingError> {
        if self.is_autocommit() {
            return Err(SqlBindingError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        self.create_statement("ROLLBACK")?.execute()?;
        Ok(())
    }

    /// Run `body` inside a transaction: commit on `Ok`, roll back on `Err` or
    /// when the commit itself fails.
    ///
    /// # Errors
    /// Returns the error from `body`, or from begin/commit.
    pub fn transaction<F, R>(&self, body: F) -> Result<R, SqlBindingError>
    where
        F: FnOnce(&Connection) -> Result<R, SqlBindingError>,
    {
        self.begin()?;
        match body(self) {
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    // A failed COMMIT (deferred constraint, busy) leaves the transaction open.
                    if !self.is_autocommit() {
                        if let Err(rollback_err) = self.rollback() {
                            tracing::warn!("rollback after failed commit failed: {rollback_err}");
                        }
                    }
                    Err(commit_err)
                }
            },
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!("rollback after failed transaction body failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    /// Whether the connection is outside any explicit transaction.
    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.state.raw.is_autocommit()
    }
}
