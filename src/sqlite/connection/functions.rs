use crate::error::{FUNCTION_CONFLICT_MESSAGE, SqlBindingError};
use crate::sqlite::function::FunctionDescriptor;

use super::Connection;

impl Connection {
    /// Register a scalar function for every arity it declares.
    ///
    /// Registering an existing name/arity replaces its callback.
    ///
    /// # Errors
    /// Returns `SqlBindingError::FunctionError` for an invalid descriptor, or
    /// `SqlBindingError::FunctionRegistrationConflict` with the engine's text if
    /// the engine refuses because a statement is mid-step.
    pub fn add_function(&self, descriptor: FunctionDescriptor) -> Result<(), SqlBindingError> {
        for key in descriptor.keys()? {
            self.state
                .raw
                .create_scalar_function(
                    descriptor.name(),
                    key.n_arg,
                    descriptor.is_deterministic(),
                    descriptor.native_callback(),
                )
                .map_err(|failure| {
                    if failure.is_busy() {
                        SqlBindingError::FunctionRegistrationConflict(failure.message)
                    } else {
                        SqlBindingError::FunctionError(failure.message)
                    }
                })?;
            tracing::debug!(function = %key.name, n_arg = key.n_arg, "scalar function registered");
            self.state.functions.borrow_mut().record(key);
        }
        Ok(())
    }

    /// Unregister every arity of a scalar function.
    ///
    /// Nothing is removed unless every arity can be removed. Arities that were
    /// never registered are skipped.
    ///
    /// # Errors
    /// Returns `SqlBindingError::FunctionRegistrationConflict` with
    /// [`FUNCTION_CONFLICT_MESSAGE`] while any statement compiled during the
    /// registration is still alive, or while any statement is positioned on a row.
    pub fn remove_function(&self, descriptor: &FunctionDescriptor) -> Result<(), SqlBindingError> {
        let keys = descriptor.keys()?;
        {
            let registry = self.state.functions.borrow();
            if let Some(key) = keys.iter().find(|key| registry.blockers(key) > 0) {
                tracing::debug!(
                    function = %key.name,
                    n_arg = key.n_arg,
                    blockers = registry.blockers(key),
                    "function removal blocked by live statements"
                );
                return Err(SqlBindingError::FunctionRegistrationConflict(
                    FUNCTION_CONFLICT_MESSAGE.to_string(),
                ));
            }
        }

        let registered: Vec<_> = {
            let registry = self.state.functions.borrow();
            keys.into_iter().filter(|key| registry.is_registered(key)).collect()
        };
        // The engine refuses removal while any statement is stopped on a row.
        if !registered.is_empty() && self.state.has_positioned_statements() {
            tracing::debug!(
                function = descriptor.name(),
                "function removal blocked by a statement mid-step"
            );
            return Err(SqlBindingError::FunctionRegistrationConflict(
                FUNCTION_CONFLICT_MESSAGE.to_string(),
            ));
        }

        for key in registered {
            self.state
                .raw
                .remove_function(&key.name, key.n_arg)
                .map_err(|failure| {
                    if failure.is_busy() {
                        SqlBindingError::FunctionRegistrationConflict(
                            FUNCTION_CONFLICT_MESSAGE.to_string(),
                        )
                    } else {
                        SqlBindingError::FunctionError(failure.message)
                    }
                })?;
            self.state.functions.borrow_mut().forget(&key);
            tracing::debug!(function = %key.name, n_arg = key.n_arg, "scalar function removed");
        }
        Ok(())
    }

    /// Number of registered (name, arity) pairs.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.state.functions.borrow().len()
    }
}
