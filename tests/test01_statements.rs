use sqlite_binding::prelude::*;

fn create_users(conn: &Connection) -> Result<(), SqlBindingError> {
    conn.create_statement("DROP TABLE IF EXISTS Users")?.execute()?;
    conn.create_statement("CREATE TABLE Users (ID INTEGER PRIMARY KEY, Name TEXT)")?
        .execute()?;

    let mut insert = conn.create_statement("INSERT INTO Users (Name) VALUES (?)")?;
    insert.bind(params!["Gabriel"])?.execute()?;
    insert.bind(params!["Aaron"])?.execute()?;
    Ok(())
}

#[test]
fn parameterless_statement_reads_and_rejects_bind() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;

    let mut stmt = conn.create_statement("SELECT 'foobar' as version")?;
    let row = stmt.first()?.expect("one row");
    assert_eq!(row.get(0)?, RowValues::Text("foobar".into()));
    assert_eq!(row.get("version")?, RowValues::Text("foobar".into()));
    assert_eq!(row.get("VERSION")?, RowValues::Text("foobar".into()));

    let mut stmt = conn.create_statement("SELECT 2 + 5 as res")?;
    assert_eq!(stmt.first()?.expect("one row").get("res")?, RowValues::Int(7));

    let err = stmt.bind(params![]).unwrap_err();
    assert!(matches!(
        err,
        SqlBindingError::ArgumentCount {
            expected: 0,
            actual: 0
        }
    ));
    let err = stmt.bind(params![1]).unwrap_err();
    assert!(matches!(err, SqlBindingError::ArgumentCount { expected: 0, actual: 1 }));

    // Executing without a bind is fine when there is nothing to bind.
    stmt.execute()?;
    assert_eq!(stmt.get(0)?, RowValues::Int(7));
    Ok(())
}

#[test]
fn first_advances_rather_than_restarting() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.create_statement("SELECT 'only' AS v")?;

    assert!(stmt.first()?.is_some());
    assert!(stmt.first()?.is_none());
    assert!(!stmt.read()?);
    assert_eq!(stmt.cursor_state(), CursorState::Exhausted);
    Ok(())
}

#[test]
fn binding_checks_counts_and_resets() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;

    let mut stmt = conn.create_statement("SELECT ? as version")?;
    assert_eq!(stmt.parameter_count(), 1);
    assert!(matches!(
        stmt.first(),
        Err(SqlBindingError::NotBound { expected: 1 })
    ));
    assert!(matches!(
        stmt.bind(params![1, 2]),
        Err(SqlBindingError::ArgumentCount { expected: 1, actual: 2 })
    ));
    assert!(matches!(
        stmt.bind(params![]),
        Err(SqlBindingError::ArgumentCount { expected: 1, actual: 0 })
    ));

    stmt.bind(params![21])?;
    assert_eq!(stmt.first()?.expect("row").get(0)?, RowValues::Int(21));
    assert_eq!(stmt.get("version")?, RowValues::Int(21));

    stmt.bind(params!["ffoooo"])?;
    assert_eq!(stmt.cursor_state(), CursorState::Unstepped);
    assert_eq!(stmt.first()?.expect("row").get("version")?, RowValues::Text("ffoooo".into()));
    Ok(())
}

#[test]
fn mixed_parameters_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.create_statement("SELECT ? as a, ? as b, ?, ?, ?")?;
    stmt.bind(params![1, "two", 3.3, vec![0xde_u8, 0xad], None::<i64>])?;

    let row = stmt.first()?.expect("row");
    assert_eq!(row.get(0)?, RowValues::Int(1));
    assert_eq!(row.get("b")?, RowValues::Text("two".into()));
    assert_eq!(row.get(2)?, RowValues::Float(3.3));
    assert_eq!(row.get(3)?, RowValues::Blob(vec![0xde, 0xad]));
    assert_eq!(row.get(4)?, RowValues::Null);
    assert_eq!(row.len(), 5);
    Ok(())
}

#[test]
fn bind_only_values_are_stored_as_their_storage_class() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.create_statement("SELECT ?, ?, ?")?;
    let ts = chrono::NaiveDate::from_ymd_opt(2010, 5, 4)
        .and_then(|d| d.and_hms_milli_opt(8, 9, 10, 500))
        .expect("valid timestamp");
    stmt.bind(&[
        RowValues::Bool(true),
        RowValues::Timestamp(ts),
        RowValues::JSON(serde_json::json!([1, 2])),
    ])?;

    let row = stmt.first()?.expect("row");
    assert_eq!(row.get(0)?, RowValues::Int(1));
    assert_eq!(row.get(1)?.as_timestamp(), Some(ts));
    assert_eq!(row.get(2)?, RowValues::Text("[1,2]".into()));
    Ok(())
}

#[test]
fn users_table_by_name_and_ordinal() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    create_users(&conn)?;

    let mut count = conn.create_statement("SELECT COUNT(*) FROM Users")?;
    assert_eq!(count.first()?.expect("row").get(0)?, RowValues::Int(2));

    let mut stmt = conn.create_statement("SELECT ID, Name FROM Users ORDER BY NAME")?;
    let row1 = stmt.first()?.expect("first row");
    assert_eq!(row1.get("Name")?, RowValues::Text("Aaron".into()));
    assert_eq!(row1.get(1)?, RowValues::Text("Aaron".into()));
    assert_eq!(row1.get("ID")?, RowValues::Int(2));
    assert_eq!(row1.get(0)?, RowValues::Int(2));

    let row2 = stmt.first()?.expect("second row");
    assert_eq!(row2.get("name")?, RowValues::Text("Gabriel".into()));
    assert_eq!(row2.get(0)?, RowValues::Int(1));

    assert!(stmt.first()?.is_none());
    Ok(())
}

#[test]
fn row_access_requires_a_current_row() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    create_users(&conn)?;

    let mut stmt = conn.query("SELECT ID, Name FROM Users")?;
    assert!(matches!(stmt.get(0), Err(SqlBindingError::NoCurrentRow)));
    assert!(matches!(stmt.current_row(), Err(SqlBindingError::NoCurrentRow)));

    assert!(stmt.read()?);
    assert!(matches!(stmt.get("missing"), Err(SqlBindingError::InvalidColumn(_))));
    assert!(matches!(stmt.get(9), Err(SqlBindingError::InvalidColumn(_))));

    assert!(stmt.read()?);
    assert!(!stmt.read()?);
    assert!(!stmt.read()?);
    assert!(matches!(stmt.get(0), Err(SqlBindingError::NoCurrentRow)));
    Ok(())
}

#[test]
fn repeated_bind_execute_reuses_one_statement() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute("CREATE TABLE nums (n INTEGER NOT NULL)", params![])?;

    let mut insert = conn.create_statement("INSERT INTO nums (n) VALUES (?)")?;
    for n in 0..100 {
        assert_eq!(insert.bind(params![n])?.execute()?, 1);
    }
    assert_eq!(conn.live_statement_count(), 1);

    let total = conn.query_scalar("SELECT SUM(n) FROM nums", params![])?;
    assert_eq!(total, RowValues::Int(4950));
    assert_eq!(conn.last_insert_rowid(), 100);
    assert_eq!(conn.changes(), 1);
    assert_eq!(conn.execute("DELETE FROM nums WHERE n < ?", params![10])?, 10);
    assert_eq!(conn.changes(), 10);
    Ok(())
}

#[test]
fn multiple_commands_do_not_compile() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let err = conn
        .create_statement(
            "CREATE TABLE Lusers (ID INTEGER PRIMARY KEY, Name TEXT); INSERT INTO Lusers (Name) VALUES ('Foo')",
        )
        .unwrap_err();
    assert!(matches!(err, SqlBindingError::CompileError(_)));
    assert!(!conn.table_exists("Lusers")?);

    // Trailing separators and comments are not a second command.
    let mut stmt = conn.create_statement("SELECT 1; -- done\n")?;
    assert_eq!(stmt.query_scalar()?, RowValues::Int(1));
    Ok(())
}

#[test]
fn invalid_and_empty_sql_fail_to_compile() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    assert!(matches!(
        conn.create_statement("SELEC 1"),
        Err(SqlBindingError::CompileError(_))
    ));
    assert!(matches!(
        conn.create_statement("  -- nothing here"),
        Err(SqlBindingError::CompileError(_))
    ));
    assert!(matches!(
        conn.create_statement("SELECT * FROM no_such_table"),
        Err(SqlBindingError::CompileError(_))
    ));
    assert_eq!(conn.live_statement_count(), 0);
    Ok(())
}

#[test]
fn engine_failures_surface_as_execution_errors() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute("CREATE TABLE uniq (id INTEGER PRIMARY KEY)", params![])?;

    let mut insert = conn.create_statement("INSERT INTO uniq (id) VALUES (?)")?;
    insert.bind(params![1])?.execute()?;
    let err = insert.bind(params![1])?.execute().unwrap_err();
    match err {
        SqlBindingError::ExecutionError(msg) => assert!(msg.contains("UNIQUE"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }

    // The statement stays usable after a failure.
    insert.bind(params![2])?.execute()?;
    assert_eq!(conn.query_scalar("SELECT COUNT(*) FROM uniq", params![])?, RowValues::Int(2));
    Ok(())
}

#[test]
fn query_scalar_handles_empty_and_null() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute("CREATE TABLE t (v TEXT)", params![])?;

    let mut stmt = conn.create_statement("SELECT v FROM t")?;
    assert_eq!(stmt.query_scalar()?, RowValues::Null);

    conn.execute("INSERT INTO t (v) VALUES (NULL)", params![])?;
    assert_eq!(stmt.query_scalar()?, RowValues::Null);

    let mut lookup = conn.create_statement("SELECT ? || '!'")?;
    assert_eq!(lookup.bind(params!["hi"])?.query_scalar()?, RowValues::Text("hi!".into()));
    // Scalar queries rewind, so asking again gives the same answer.
    assert_eq!(lookup.query_scalar()?, RowValues::Text("hi!".into()));
    Ok(())
}

#[test]
fn collect_rows_materializes_remaining_rows() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    create_users(&conn)?;

    let rs = conn.select("SELECT ID, Name FROM Users WHERE ID >= ? ORDER BY ID", params![1])?;
    assert_eq!(rs.len(), 2);
    assert_eq!(rs.results[0].get("name"), Some(&RowValues::Text("Gabriel".into())));
    assert_eq!(
        rs.get_column_names().map(|names| names.as_ref().clone()),
        Some(vec!["ID".to_string(), "Name".to_string()])
    );

    let mut stmt = conn.query("SELECT ID FROM Users ORDER BY ID")?;
    assert!(stmt.read()?);
    let snapshot = stmt.current_row()?.to_owned_row()?;
    let rest = stmt.collect_rows()?;
    assert_eq!(snapshot.get_by_index(0), Some(&RowValues::Int(1)));
    assert_eq!(rest.len(), 1);
    assert_eq!(rest.results[0].get("id"), Some(&RowValues::Int(2)));
    Ok(())
}

#[test]
fn execute_counts_only_rows_the_command_changed() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute("CREATE TABLE t (v INTEGER)", params![])?;
    assert_eq!(conn.execute("INSERT INTO t (v) VALUES (1), (2), (3)", params![])?, 3);

    assert_eq!(conn.execute("CREATE TABLE other (x)", params![])?, 0);
    assert_eq!(conn.create_statement("SELECT v FROM t")?.execute()?, 0);
    assert_eq!(conn.execute("UPDATE t SET v = 0 WHERE v > ?", params![10])?, 0);
    assert_eq!(conn.execute("UPDATE t SET v = 0 WHERE v > ?", params![1])?, 2);
    Ok(())
}
