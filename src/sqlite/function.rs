use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::error::SqlBindingError;
use crate::types::RowValues;

/// Largest argument count the engine accepts for a user function.
pub const MAX_FUNCTION_ARGS: usize = 127;

/// Number of arguments a scalar function accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments.
    Fixed(usize),
    /// Any of these argument counts; each is registered separately.
    Set(Vec<usize>),
    /// Any number of arguments.
    Variadic,
}

impl Arity {
    /// Argument counts in the engine's encoding (`-1` for variadic).
    ///
    /// # Errors
    /// Returns `SqlBindingError::FunctionError` for an empty set or a count
    /// above [`MAX_FUNCTION_ARGS`].
    pub(crate) fn native_counts(&self) -> Result<Vec<i32>, SqlBindingError> {
        let counts: Vec<usize> = match self {
            Arity::Fixed(n) => vec![*n],
            Arity::Set(set) => {
                let unique: BTreeSet<usize> = set.iter().copied().collect();
                unique.into_iter().collect()
            }
            Arity::Variadic => return Ok(vec![-1]),
        };
        if counts.is_empty() {
            return Err(SqlBindingError::FunctionError(
                "arity set must name at least one argument count".into(),
            ));
        }
        counts
            .into_iter()
            .map(|n| {
                i32::try_from(n)
                    .ok()
                    .filter(|_| n <= MAX_FUNCTION_ARGS)
                    .ok_or_else(|| {
                        SqlBindingError::FunctionError(format!(
                            "argument count {n} exceeds the limit of {MAX_FUNCTION_ARGS}"
                        ))
                    })
            })
            .collect()
    }
}

/// A scalar function implemented in Rust and callable from SQL.
///
/// ```rust
/// use sqlite_binding::prelude::*;
///
/// struct Double;
///
/// impl ScalarFunction for Double {
///     fn name(&self) -> &str {
///         "DOUBLE"
///     }
///
///     fn arity(&self) -> Arity {
///         Arity::Fixed(1)
///     }
///
///     fn invoke(&self, args: &[RowValues]) -> Result<RowValues, SqlBindingError> {
///         Ok(match &args[0] {
///             RowValues::Int(i) => RowValues::Int(i * 2),
///             RowValues::Float(f) => RowValues::Float(f * 2.0),
///             _ => RowValues::Null,
///         })
///     }
/// }
///
/// let conn = Connection::open_in_memory()?;
/// conn.add_function(FunctionDescriptor::from_function(Double))?;
/// assert_eq!(conn.query_scalar("SELECT DOUBLE(21)", params![])?, RowValues::Int(42));
/// # Ok::<(), SqlBindingError>(())
/// ```
pub trait ScalarFunction {
    fn name(&self) -> &str;

    fn arity(&self) -> Arity;

    /// Whether equal inputs always yield equal outputs.
    fn deterministic(&self) -> bool {
        false
    }

    /// Compute the result for one call.
    ///
    /// # Errors
    /// An error is reported to the calling SQL statement as an execution error.
    fn invoke(&self, args: &[RowValues]) -> Result<RowValues, SqlBindingError>;
}

type Callback = dyn Fn(&[RowValues]) -> Result<RowValues, SqlBindingError>;

/// Explicit registration record: name, arity and callback.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    arity: Arity,
    deterministic: bool,
    callback: Rc<Callback>,
}

impl FunctionDescriptor {
    pub fn new<F>(name: impl Into<String>, arity: Arity, callback: F) -> Self
    where
        F: Fn(&[RowValues]) -> Result<RowValues, SqlBindingError> + 'static,
    {
        Self {
            name: name.into(),
            arity,
            deterministic: false,
            callback: Rc::new(callback),
        }
    }

    pub fn from_function<T: ScalarFunction + 'static>(function: T) -> Self {
        let name = function.name().to_string();
        let arity = function.arity();
        let deterministic = function.deterministic();
        Self {
            name,
            arity,
            deterministic,
            callback: Rc::new(move |args: &[RowValues]| function.invoke(args)),
        }
    }

    #[must_use]
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    pub(crate) fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Boxed trampoline target for one native registration.
    pub(crate) fn native_callback(&self) -> Box<Callback> {
        let callback = Rc::clone(&self.callback);
        Box::new(move |args: &[RowValues]| callback(args))
    }

    pub(crate) fn keys(&self) -> Result<Vec<FunctionKey>, SqlBindingError> {
        if self.name.is_empty() {
            return Err(SqlBindingError::FunctionError(
                "function name must not be empty".into(),
            ));
        }
        Ok(self
            .arity
            .native_counts()?
            .into_iter()
            .map(|n_arg| FunctionKey::new(&self.name, n_arg))
            .collect())
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("deterministic", &self.deterministic)
            .finish_non_exhaustive()
    }
}

/// Engine identity of one registration: function names are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FunctionKey {
    pub(crate) name: String,
    pub(crate) n_arg: i32,
}

impl FunctionKey {
    fn new(name: &str, n_arg: i32) -> Self {
        Self {
            name: name.to_uppercase(),
            n_arg,
        }
    }
}

pub(crate) type StatementId = u64;

/// Registered functions and the live statements compiled while each was registered.
#[derive(Debug, Default)]
pub(crate) struct FunctionRegistry {
    entries: HashMap<FunctionKey, BTreeSet<StatementId>>,
}

impl FunctionRegistry {
    /// Record a registration. Replacing keeps the existing dependents.
    pub(crate) fn record(&mut self, key: FunctionKey) {
        self.entries.entry(key).or_default();
    }

    pub(crate) fn is_registered(&self, key: &FunctionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Link a newly compiled statement to every registered function.
    pub(crate) fn track_statement(&mut self, id: StatementId) {
        for dependents in self.entries.values_mut() {
            dependents.insert(id);
        }
    }

    pub(crate) fn release_statement(&mut self, id: StatementId) {
        for dependents in self.entries.values_mut() {
            dependents.remove(&id);
        }
    }

    /// Number of live statements that block removing `key`.
    pub(crate) fn blockers(&self, key: &FunctionKey) -> usize {
        self.entries.get(key).map_or(0, BTreeSet::len)
    }

    pub(crate) fn forget(&mut self, key: &FunctionKey) {
        self.entries.remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
