use clap::Parser;
use tracing::Level;

use sqlite_binding::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one SQL command against a SQLite database")]
struct Args {
    /// Database path; `:memory:` for a throwaway in-memory database
    #[arg(long, default_value = ":memory:")]
    db: String,
    /// Open the database read-only
    #[arg(long)]
    read_only: bool,
    #[arg(long, value_enum)]
    journal_mode: Option<JournalMode>,
    /// Positional parameter, repeatable; integers and floats are detected, `NULL` binds null
    #[arg(short = 'p', long = "param")]
    params: Vec<String>,
    /// Print rows as JSON objects, one per line
    #[arg(long)]
    json: bool,
    #[arg(long)]
    verbose: bool,
    sql: String,
}

fn parse_param(raw: &str) -> RowValues {
    if raw == "NULL" {
        RowValues::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        RowValues::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        RowValues::Float(f)
    } else {
        RowValues::Text(raw.to_string())
    }
}

fn render(value: &RowValues) -> String {
    match value {
        RowValues::Null => "NULL".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Text(s) => s.clone(),
        RowValues::Blob(bytes) => format!("<{} bytes>", bytes.len()),
        other => other.to_json().to_string(),
    }
}

fn run(args: &Args) -> Result<(), SqlBindingError> {
    let mut builder = Connection::builder(args.db.clone()).read_only(args.read_only);
    if let Some(mode) = args.journal_mode {
        builder = builder.journal_mode(mode);
    }
    let conn = builder.build()?;

    let params: Vec<RowValues> = args.params.iter().map(|p| parse_param(p)).collect();
    let mut stmt = conn.create_statement(&args.sql)?;
    if !params.is_empty() || stmt.parameter_count() > 0 {
        stmt.bind(&params)?;
    }

    if stmt.column_count() == 0 {
        let changed = stmt.execute()?;
        println!("{changed} row(s) changed");
        return Ok(());
    }

    let rows = stmt.collect_rows()?;
    if args.json {
        for row in &rows.results {
            println!("{}", row.to_json());
        }
    } else {
        println!("{}", stmt.column_names().join("\t"));
        for row in &rows.results {
            let line: Vec<String> = row.rows.iter().map(render).collect();
            println!("{}", line.join("\t"));
        }
    }
    tracing::info!("{} row(s)", rows.len());
    Ok(())
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
