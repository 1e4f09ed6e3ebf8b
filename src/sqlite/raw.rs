// Native engine layer.
//
// Every call into the SQLite C API lives in this file. The rest of the crate
// sees only `RawConnection`, `RawStatement`, `NativeValue` and `EngineFailure`,
// so no raw pointer ever leaves this module.
#![allow(unsafe_code)]

use std::borrow::Cow;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::slice;

use rusqlite::ffi;

use crate::error::SqlBindingError;
use crate::types::RowValues;

use super::params::row_value_to_native;
use super::query::native_to_row_value;

// libsqlite3-sys leaves close_v2 out of its generated bindings; the bundled
// library still exports it.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut ffi::sqlite3) -> c_int;
}

/// Error code and message reported by the engine for a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EngineFailure {
    pub(crate) code: c_int,
    pub(crate) message: String,
}

impl EngineFailure {
    fn from_code(code: c_int) -> Self {
        Self {
            code,
            message: errstr(code),
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.code & 0xff == ffi::SQLITE_BUSY
    }
}

/// A value as the engine stores it, borrowed from a column or argument cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NativeValue<'a> {
    Null,
    Integer(i64),
    Real(f64),
    Text(Cow<'a, str>),
    Blob(&'a [u8]),
}

/// Outcome of one `sqlite3_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Row,
    Done,
}

/// Callback invoked by a scalar-function trampoline.
pub(crate) type ScalarCallback = dyn Fn(&[RowValues]) -> Result<RowValues, SqlBindingError>;

fn errstr(code: c_int) -> String {
    // SAFETY: errstr accepts any code and returns a static string or null.
    let msg = unsafe { ffi::sqlite3_errstr(code) };
    if msg.is_null() {
        format!("sqlite error code {code}")
    } else {
        // SAFETY: non-null, NUL-terminated and static.
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}

fn db_errmsg(db: *mut ffi::sqlite3, code: c_int) -> EngineFailure {
    if db.is_null() {
        return EngineFailure::from_code(code);
    }
    // SAFETY: `db` is a live handle; the message is copied before any other call.
    let msg = unsafe { ffi::sqlite3_errmsg(db) };
    if msg.is_null() {
        return EngineFailure::from_code(code);
    }
    EngineFailure {
        code,
        // SAFETY: checked non-null above.
        message: unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned(),
    }
}

fn len_as_c_int(len: usize) -> Result<c_int, EngineFailure> {
    c_int::try_from(len).map_err(|_| EngineFailure::from_code(ffi::SQLITE_TOOBIG))
}

/// Exclusive owner of one `sqlite3*` database handle.
pub(crate) struct RawConnection {
    db: NonNull<ffi::sqlite3>,
}

impl RawConnection {
    pub(crate) fn open(path: &str, flags: c_int) -> Result<Self, EngineFailure> {
        let c_path = CString::new(path).map_err(|_| EngineFailure {
            code: ffi::SQLITE_MISUSE,
            message: format!("database path contains an interior NUL byte: {path:?}"),
        })?;
        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: `c_path` outlives the call and `db` is a valid out-pointer.
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let failure = db_errmsg(db, rc);
            if !db.is_null() {
                // SAFETY: a failed open still allocates a handle that must be closed once.
                unsafe { ffi::sqlite3_close(db) };
            }
            return Err(failure);
        }
        match NonNull::new(db) {
            Some(db) => Ok(Self { db }),
            None => Err(EngineFailure::from_code(ffi::SQLITE_NOMEM)),
        }
    }

    fn failure(&self, code: c_int) -> EngineFailure {
        db_errmsg(self.db.as_ptr(), code)
    }

    // SAFETY (all methods below): `self.db` is open until `Drop` runs.

    pub(crate) fn busy_timeout(&self, millis: c_int) -> Result<(), EngineFailure> {
        let rc = unsafe { ffi::sqlite3_busy_timeout(self.db.as_ptr(), millis) };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.failure(rc))
        }
    }

    /// Compile the first command of `sql`.
    ///
    /// Returns the statement (`None` when the text holds no command) and the
    /// byte offset at which compilation stopped.
    pub(crate) fn prepare(
        &self,
        sql: &str,
    ) -> Result<(Option<RawStatement>, usize), EngineFailure> {
        let len = len_as_c_int(sql.len())?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        // SAFETY: `sql` is valid for `len` bytes; `tail` points back into it.
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                self.db.as_ptr(),
                sql.as_ptr().cast::<c_char>(),
                len,
                &mut stmt,
                &mut tail,
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(self.failure(rc));
        }
        let offset = if tail.is_null() {
            sql.len()
        } else {
            let start = sql.as_ptr() as usize;
            (tail as usize).saturating_sub(start).min(sql.len())
        };
        Ok((NonNull::new(stmt).map(|stmt| RawStatement { stmt }), offset))
    }

    pub(crate) fn changes(&self) -> i64 {
        i64::from(unsafe { ffi::sqlite3_changes(self.db.as_ptr()) })
    }

    pub(crate) fn total_changes(&self) -> i64 {
        i64::from(unsafe { ffi::sqlite3_total_changes(self.db.as_ptr()) })
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.db.as_ptr()) }
    }

    pub(crate) fn is_autocommit(&self) -> bool {
        unsafe { ffi::sqlite3_get_autocommit(self.db.as_ptr()) != 0 }
    }

    /// Install a trampoline for `name` with `n_arg` arguments.
    ///
    /// Ownership of `callback` passes to the engine, which drops it through
    /// `drop_callback` when the function is replaced, removed, or the
    /// connection closes (and also when this call fails).
    pub(crate) fn create_scalar_function(
        &self,
        name: &str,
        n_arg: c_int,
        deterministic: bool,
        callback: Box<ScalarCallback>,
    ) -> Result<(), EngineFailure> {
        let c_name = function_name(name)?;
        let mut flags = ffi::SQLITE_UTF8;
        if deterministic {
            flags |= ffi::SQLITE_DETERMINISTIC;
        }
        let user_data = Box::into_raw(Box::new(callback)).cast::<c_void>();
        // SAFETY: the engine owns `user_data` from here and frees it through
        // `drop_callback`, including on failure.
        let rc = unsafe {
            ffi::sqlite3_create_function_v2(
                self.db.as_ptr(),
                c_name.as_ptr(),
                n_arg,
                flags,
                user_data,
                Some(call_scalar),
                None,
                None,
                Some(drop_callback),
            )
        };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.failure(rc))
        }
    }

    pub(crate) fn remove_function(&self, name: &str, n_arg: c_int) -> Result<(), EngineFailure> {
        let c_name = function_name(name)?;
        let rc = unsafe {
            ffi::sqlite3_create_function_v2(
                self.db.as_ptr(),
                c_name.as_ptr(),
                n_arg,
                ffi::SQLITE_UTF8,
                ptr::null_mut(),
                None,
                None,
                None,
                None,
            )
        };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.failure(rc))
        }
    }
}

impl Drop for RawConnection {
    fn drop(&mut self) {
        // SAFETY: called exactly once. With statements still unfinalized the
        // handle becomes a zombie and is freed by the last finalize.
        let rc = unsafe { sqlite3_close_v2(self.db.as_ptr()) };
        if rc != ffi::SQLITE_OK {
            tracing::warn!("sqlite3_close_v2 failed: {}", errstr(rc));
        }
    }
}

fn function_name(name: &str) -> Result<CString, EngineFailure> {
    CString::new(name).map_err(|_| EngineFailure {
        code: ffi::SQLITE_MISUSE,
        message: format!("function name contains an interior NUL byte: {name:?}"),
    })
}

/// Exclusive owner of one `sqlite3_stmt*`; finalized on drop.
pub(crate) struct RawStatement {
    stmt: NonNull<ffi::sqlite3_stmt>,
}

impl RawStatement {
    // SAFETY (all methods below): `self.stmt` is unfinalized until `Drop` runs,
    // and a zombie connection keeps its handle valid for it.

    fn failure(&self, code: c_int) -> EngineFailure {
        let db = unsafe { ffi::sqlite3_db_handle(self.stmt.as_ptr()) };
        db_errmsg(db, code)
    }

    pub(crate) fn parameter_count(&self) -> usize {
        let count = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    pub(crate) fn column_count(&self) -> usize {
        let count = unsafe { ffi::sqlite3_column_count(self.stmt.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    pub(crate) fn column_name(&self, idx: usize) -> Option<String> {
        let idx = c_int::try_from(idx).ok()?;
        let name = unsafe { ffi::sqlite3_column_name(self.stmt.as_ptr(), idx) };
        if name.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
        }
    }

    pub(crate) fn step(&mut self) -> Result<Step, EngineFailure> {
        match unsafe { ffi::sqlite3_step(self.stmt.as_ptr()) } {
            ffi::SQLITE_ROW => Ok(Step::Row),
            ffi::SQLITE_DONE => Ok(Step::Done),
            rc => Err(self.failure(rc)),
        }
    }

    /// Rewind to the start. The return code repeats the last step failure, so it is not reported.
    pub(crate) fn reset(&mut self) {
        unsafe { ffi::sqlite3_reset(self.stmt.as_ptr()) };
    }

    pub(crate) fn clear_bindings(&mut self) {
        unsafe { ffi::sqlite3_clear_bindings(self.stmt.as_ptr()) };
    }

    /// Bind `value` to the 1-based placeholder `idx`.
    pub(crate) fn bind(&mut self, idx: usize, value: &NativeValue<'_>) -> Result<(), EngineFailure> {
        let idx = c_int::try_from(idx).map_err(|_| EngineFailure::from_code(ffi::SQLITE_RANGE))?;
        let stmt = self.stmt.as_ptr();
        let rc = match value {
            NativeValue::Null => unsafe { ffi::sqlite3_bind_null(stmt, idx) },
            NativeValue::Integer(i) => unsafe { ffi::sqlite3_bind_int64(stmt, idx, *i) },
            NativeValue::Real(f) => unsafe { ffi::sqlite3_bind_double(stmt, idx, *f) },
            NativeValue::Text(s) => {
                let len = len_as_c_int(s.len())?;
                unsafe {
                    ffi::sqlite3_bind_text(
                        stmt,
                        idx,
                        s.as_ptr().cast::<c_char>(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    )
                }
            }
            NativeValue::Blob(b) if b.is_empty() => unsafe {
                ffi::sqlite3_bind_zeroblob(stmt, idx, 0)
            },
            NativeValue::Blob(b) => {
                let len = len_as_c_int(b.len())?;
                unsafe {
                    ffi::sqlite3_bind_blob(
                        stmt,
                        idx,
                        b.as_ptr().cast::<c_void>(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    )
                }
            }
        };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.failure(rc))
        }
    }

    /// Read column `idx` of the current row. The borrow ends before the next step.
    pub(crate) fn column_value(&self, idx: usize) -> NativeValue<'_> {
        let Ok(idx) = c_int::try_from(idx) else {
            return NativeValue::Null;
        };
        let stmt = self.stmt.as_ptr();
        match unsafe { ffi::sqlite3_column_type(stmt, idx) } {
            ffi::SQLITE_INTEGER => NativeValue::Integer(unsafe { ffi::sqlite3_column_int64(stmt, idx) }),
            ffi::SQLITE_FLOAT => NativeValue::Real(unsafe { ffi::sqlite3_column_double(stmt, idx) }),
            ffi::SQLITE_TEXT => {
                let text = unsafe { ffi::sqlite3_column_text(stmt, idx) };
                let len = unsafe { ffi::sqlite3_column_bytes(stmt, idx) };
                NativeValue::Text(String::from_utf8_lossy(unsafe { borrow_bytes(text, len) }))
            }
            ffi::SQLITE_BLOB => {
                let blob = unsafe { ffi::sqlite3_column_blob(stmt, idx) };
                let len = unsafe { ffi::sqlite3_column_bytes(stmt, idx) };
                NativeValue::Blob(unsafe { borrow_bytes(blob.cast::<u8>(), len) })
            }
            _ => NativeValue::Null,
        }
    }
}

impl Drop for RawStatement {
    fn drop(&mut self) {
        // SAFETY: called exactly once; valid even after the connection entered close_v2.
        unsafe { ffi::sqlite3_finalize(self.stmt.as_ptr()) };
    }
}

/// # Safety
/// `ptr` must be null or point at `len` readable bytes that outlive `'a`.
unsafe fn borrow_bytes<'a>(ptr: *const u8, len: c_int) -> &'a [u8] {
    match usize::try_from(len) {
        Ok(len) if !ptr.is_null() && len > 0 => unsafe { slice::from_raw_parts(ptr, len) },
        _ => &[],
    }
}

/// # Safety
/// `value` must be a valid protected `sqlite3_value*` for the duration of `'a`.
unsafe fn argument_value<'a>(value: *mut ffi::sqlite3_value) -> NativeValue<'a> {
    match unsafe { ffi::sqlite3_value_type(value) } {
        ffi::SQLITE_INTEGER => NativeValue::Integer(unsafe { ffi::sqlite3_value_int64(value) }),
        ffi::SQLITE_FLOAT => NativeValue::Real(unsafe { ffi::sqlite3_value_double(value) }),
        ffi::SQLITE_TEXT => {
            let text = unsafe { ffi::sqlite3_value_text(value) };
            let len = unsafe { ffi::sqlite3_value_bytes(value) };
            NativeValue::Text(String::from_utf8_lossy(unsafe { borrow_bytes(text, len) }))
        }
        ffi::SQLITE_BLOB => {
            let blob = unsafe { ffi::sqlite3_value_blob(value) };
            let len = unsafe { ffi::sqlite3_value_bytes(value) };
            NativeValue::Blob(unsafe { borrow_bytes(blob.cast::<u8>(), len) })
        }
        _ => NativeValue::Null,
    }
}

/// # Safety
/// `ctx` must be the context handed to the currently running trampoline.
unsafe fn set_result(ctx: *mut ffi::sqlite3_context, value: &NativeValue<'_>) {
    match value {
        NativeValue::Null => unsafe { ffi::sqlite3_result_null(ctx) },
        NativeValue::Integer(i) => unsafe { ffi::sqlite3_result_int64(ctx, *i) },
        NativeValue::Real(f) => unsafe { ffi::sqlite3_result_double(ctx, *f) },
        NativeValue::Text(s) => match c_int::try_from(s.len()) {
            Ok(len) => unsafe {
                ffi::sqlite3_result_text(
                    ctx,
                    s.as_ptr().cast::<c_char>(),
                    len,
                    ffi::SQLITE_TRANSIENT(),
                );
            },
            Err(_) => unsafe { ffi::sqlite3_result_error_toobig(ctx) },
        },
        NativeValue::Blob(b) => match c_int::try_from(b.len()) {
            Ok(len) => unsafe {
                ffi::sqlite3_result_blob(
                    ctx,
                    b.as_ptr().cast::<c_void>(),
                    len,
                    ffi::SQLITE_TRANSIENT(),
                );
            },
            Err(_) => unsafe { ffi::sqlite3_result_error_toobig(ctx) },
        },
    }
}

/// # Safety
/// `ctx` must be the context handed to the currently running trampoline.
unsafe fn set_error(ctx: *mut ffi::sqlite3_context, message: &str) {
    let len = c_int::try_from(message.len()).unwrap_or(c_int::MAX);
    unsafe { ffi::sqlite3_result_error(ctx, message.as_ptr().cast::<c_char>(), len) };
}

unsafe extern "C" fn call_scalar(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) {
    // SAFETY: the engine passes the live context, `argc` cells in `argv`, and the
    // user data installed by `create_scalar_function`, which outlives the call.
    let user_data = unsafe { ffi::sqlite3_user_data(ctx) }.cast::<Box<ScalarCallback>>();
    if user_data.is_null() {
        unsafe { set_error(ctx, "scalar function invoked without a registered callback") };
        return;
    }
    let callback = unsafe { &*user_data };

    let cells: &[*mut ffi::sqlite3_value] = match usize::try_from(argc) {
        Ok(n) if n > 0 && !argv.is_null() => unsafe { slice::from_raw_parts(argv, n) },
        _ => &[],
    };
    let args: Vec<RowValues> = cells
        .iter()
        .map(|&cell| native_to_row_value(unsafe { argument_value(cell) }))
        .collect();

    match panic::catch_unwind(AssertUnwindSafe(|| callback(&args))) {
        Ok(Ok(value)) => {
            let native = row_value_to_native(&value);
            unsafe { set_result(ctx, &native) };
        }
        Ok(Err(err)) => {
            tracing::debug!("scalar function returned an error: {err}");
            unsafe { set_error(ctx, &err.to_string()) };
        }
        Err(_) => {
            tracing::warn!("scalar function panicked; reporting as SQL error");
            unsafe { set_error(ctx, "scalar function panicked") };
        }
    }
}

unsafe extern "C" fn drop_callback(user_data: *mut c_void) {
    if !user_data.is_null() {
        // SAFETY: produced by `Box::into_raw` in `create_scalar_function`; the
        // engine calls this once per registration.
        drop(unsafe { Box::from_raw(user_data.cast::<Box<ScalarCallback>>()) });
    }
}
