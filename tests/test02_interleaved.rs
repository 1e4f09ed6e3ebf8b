use sqlite_binding::prelude::*;

fn seeded() -> Result<Connection, SqlBindingError> {
    let conn = Connection::open_in_memory()?;
    conn.execute("CREATE TABLE Users (ID INTEGER PRIMARY KEY, Name TEXT)", params![])?;
    let mut insert = conn.create_statement("INSERT INTO Users (Name) VALUES (?)")?;
    insert.bind(params!["Gabriel"])?.execute()?;
    insert.bind(params!["Aaron"])?.execute()?;
    Ok(conn)
}

#[test]
fn interleaved_cursors_keep_their_own_order() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;

    let mut q1 = conn.query("SELECT ID, Name FROM Users ORDER BY NAME")?;
    let mut q2 = conn.query("SELECT ID, Name FROM Users ORDER BY ID")?;
    assert_eq!(conn.live_statement_count(), 2);

    assert!(q1.read()?);
    assert!(q2.read()?);
    assert_eq!(q1.get("Name")?, RowValues::Text("Aaron".into()));
    assert_eq!(q2.get("Name")?, RowValues::Text("Gabriel".into()));

    assert!(q2.read()?);
    assert_eq!(q2.get("Name")?, RowValues::Text("Aaron".into()));
    assert!(q1.read()?);
    assert_eq!(q1.get("Name")?, RowValues::Text("Gabriel".into()));

    assert!(!q2.read()?);
    assert!(!q1.read()?);

    q1.dispose();
    q2.dispose();
    assert_eq!(conn.live_statement_count(), 0);
    Ok(())
}

#[test]
fn writes_between_steps_do_not_disturb_an_open_cursor() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;

    let mut reader = conn.query("SELECT Name FROM Users ORDER BY ID")?;
    assert!(reader.read()?);
    assert_eq!(reader.get(0)?, RowValues::Text("Gabriel".into()));

    let mut counter = conn.create_statement("SELECT COUNT(*) FROM Users WHERE Name = ?")?;
    assert_eq!(counter.bind(params!["Aaron"])?.query_scalar()?, RowValues::Int(1));
    assert_eq!(counter.bind(params!["Nobody"])?.query_scalar()?, RowValues::Int(0));

    assert!(reader.read()?);
    assert_eq!(reader.get(0)?, RowValues::Text("Aaron".into()));
    assert!(!reader.read()?);
    Ok(())
}

#[test]
fn rebinding_one_cursor_leaves_the_other_alone() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;

    let mut by_id = conn.query("SELECT Name FROM Users WHERE ID >= ? ORDER BY ID")?;
    let mut all = conn.query("SELECT Name FROM Users ORDER BY Name DESC")?;

    by_id.bind(params![1])?;
    assert!(by_id.read()?);
    assert!(all.read()?);
    assert_eq!(all.get(0)?, RowValues::Text("Gabriel".into()));

    by_id.bind(params![2])?;
    assert!(by_id.read()?);
    assert_eq!(by_id.get(0)?, RowValues::Text("Aaron".into()));
    assert!(!by_id.read()?);

    assert!(all.read()?);
    assert_eq!(all.get(0)?, RowValues::Text("Aaron".into()));
    Ok(())
}
