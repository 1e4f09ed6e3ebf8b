use std::path::Path;

use sqlite_binding::prelude::*;
use tempfile::tempdir;

#[test]
fn statements_fail_after_connection_close() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut pending = conn.create_statement("SELECT ?")?;
    let mut positioned = conn.query("SELECT 1 UNION ALL SELECT 2")?;
    assert!(positioned.read()?);

    conn.close();

    assert!(matches!(
        pending.bind(params![1]),
        Err(SqlBindingError::UseAfterClose(_))
    ));
    assert!(matches!(positioned.read(), Err(SqlBindingError::UseAfterClose(_))));
    assert!(matches!(positioned.get(0), Err(SqlBindingError::UseAfterClose(_))));
    assert!(matches!(
        positioned.query_scalar(),
        Err(SqlBindingError::UseAfterClose(_))
    ));

    // Releasing after the connection is gone is a quiet no-op.
    pending.dispose();
    positioned.dispose();
    positioned.dispose();
    assert!(positioned.is_disposed());
    Ok(())
}

#[test]
fn dropping_statements_after_connection_is_safe() -> Result<(), Box<dyn std::error::Error>> {
    let stmts = {
        let conn = Connection::open_in_memory()?;
        conn.execute("CREATE TABLE t (v INTEGER)", params![])?;
        conn.execute("INSERT INTO t (v) VALUES (1), (2)", params![])?;
        let mut a = conn.query("SELECT v FROM t")?;
        let b = conn.query("SELECT COUNT(*) FROM t")?;
        assert!(a.read()?);
        vec![a, b]
    };
    assert_eq!(stmts.len(), 2);
    drop(stmts);
    Ok(())
}

#[test]
fn dispose_is_idempotent_and_untracks() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.create_statement("SELECT 1")?;
    assert_eq!(conn.live_statement_count(), 1);

    stmt.dispose();
    assert_eq!(conn.live_statement_count(), 0);
    stmt.dispose();
    assert_eq!(conn.live_statement_count(), 0);
    assert_eq!(stmt.cursor_state(), CursorState::Disposed);

    assert!(matches!(stmt.read(), Err(SqlBindingError::UseAfterClose(_))));
    assert!(matches!(stmt.execute(), Err(SqlBindingError::UseAfterClose(_))));
    assert!(matches!(
        stmt.bind(params![1]),
        Err(SqlBindingError::UseAfterClose(_))
    ));
    Ok(())
}

#[test]
fn scoped_statements_release_on_every_exit_path() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;

    let failing = || -> Result<(), SqlBindingError> {
        let mut stmt = conn.create_statement("SELECT ?")?;
        stmt.bind(params![1, 2])?;
        Ok(())
    };
    assert!(failing().is_err());
    assert_eq!(conn.live_statement_count(), 0);

    {
        let _a = conn.create_statement("SELECT 1")?;
        let _b = conn.create_statement("SELECT 2")?;
        assert_eq!(conn.live_statement_count(), 2);
    }
    assert_eq!(conn.live_statement_count(), 0);
    Ok(())
}

#[test]
fn function_removal_waits_for_statement_drop() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let one = FunctionDescriptor::new("ONE", Arity::Fixed(0), |_| Ok(RowValues::Int(1)));
    conn.add_function(one.clone())?;

    let stmt = conn.create_statement("SELECT ONE()")?;
    assert!(conn.remove_function(&one).is_err());
    drop(stmt);
    conn.remove_function(&one)?;
    // Removing an unregistered function is a no-op.
    conn.remove_function(&one)?;
    Ok(())
}

#[test]
fn closed_connection_is_freed_once_its_last_statement_goes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("zombie.db").to_string_lossy().into_owned();
    let wal = format!("{path}-wal");

    let conn = Connection::builder(path.clone())
        .journal_mode(JournalMode::Wal)
        .build()?;
    conn.execute("CREATE TABLE t (v INTEGER)", params![])?;
    conn.execute("INSERT INTO t (v) VALUES (1), (2)", params![])?;
    let mut pending = conn.query("SELECT v FROM t")?;
    assert!(pending.read()?);

    conn.close();
    // The handle stays open, and keeps its log, while a statement needs it.
    assert!(Path::new(&wal).exists());

    drop(pending);
    // The final close checkpoints and removes the log.
    assert!(!Path::new(&wal).exists());

    let reopened = Connection::open(path)?;
    reopened.execute("PRAGMA locking_mode = EXCLUSIVE", params![])?;
    reopened.execute("BEGIN EXCLUSIVE", params![])?;
    reopened.rollback()?;
    Ok(())
}
