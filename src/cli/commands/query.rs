//! Query command implementation.
//!
//! Runs one statement inside a session, so a mutating statement ends up in
//! the snapshot when the session closes. Parameters are bound as text.

use crate::cli::QueryArgs;
use crate::config::resolve_db_path;
use crate::error::Result;
use crate::snapshot::{SnapshotValue, sql_literal};
use crate::storage::{Record, Session, factory};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::path::PathBuf;

/// Execute the query command.
///
/// With `json`, rows are printed as JSON lines: one object per row, or one
/// array per row with `--positional`.
///
/// # Errors
///
/// Returns `Error::Query` if the statement fails, plus any session error.
pub fn execute(
    args: &QueryArgs,
    db_path: Option<&PathBuf>,
    snapshot_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path));
    let mut session = Session::open_with(&db_path, super::session_options(snapshot_path))?;

    let mut header = Vec::new();
    let rows = session.query_with(&args.sql, params_from_iter(&args.params), |columns, row| {
        if header.is_empty() {
            header = columns.names().to_vec();
        }
        factory::positional(columns, row)
    })?;

    // Close before reporting so a failed dump is not hidden by the rows.
    session.close()?;

    if json {
        for row in rows {
            let line = if args.positional {
                let values: Vec<SnapshotValue> = row.into_iter().map(SnapshotValue::Sql).collect();
                serde_json::to_string(&values)?
            } else {
                let record: Record = header.iter().cloned().zip(row).collect();
                serde_json::to_string(&record)?
            };
            println!("{line}");
        }
        return Ok(());
    }

    print_table(&header, &rows, args.positional);
    Ok(())
}

fn print_table(header: &[String], rows: &[Vec<Value>], positional: bool) {
    if rows.is_empty() {
        println!("(no rows)");
        return;
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(display).collect())
        .collect();

    let mut widths: Vec<usize> = if positional {
        vec![0; header.len()]
    } else {
        header.iter().map(|h| h.chars().count()).collect()
    };
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    if !positional {
        let line: Vec<String> = header
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:<w$}"))
            .collect();
        println!("{}", line.join("  ").trim_end());
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        println!("{}", rule.join("  "));
    }

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }

    println!();
    println!("({} rows)", rows.len());
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Text(s) => s.clone(),
        Value::Integer(_) | Value::Real(_) | Value::Blob(_) => sql_literal(value),
    }
}
