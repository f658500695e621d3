//! Snapshot import (restore).
//!
//! Restoring replays a snapshot into an empty database: tables are created
//! and populated in document order, then indexes, views and triggers are
//! created. Everything runs in a single transaction, so a failure leaves the
//! database as it was.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::snapshot::types::{Snapshot, SnapshotStats, SnapshotValue, TableSnapshot};
use crate::storage::schema::quote_ident;

/// Importer for snapshot files.
pub struct Importer<'a> {
    conn: &'a mut Connection,
    origin: PathBuf,
}

impl<'a> Importer<'a> {
    /// Create an importer. `origin` is the snapshot path, used in errors.
    #[must_use]
    pub fn new(conn: &'a mut Connection, origin: &Path) -> Self {
        Self {
            conn,
            origin: origin.to_path_buf(),
        }
    }

    /// Populate the database from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Restore` if a table, row or schema object cannot be
    /// created (for example a table that already exists or a row violating a
    /// constraint), and `Error::Database` if the transaction itself fails.
    /// Nothing is committed on error.
    pub fn import(&mut self, snapshot: &Snapshot) -> Result<SnapshotStats> {
        let tx = self.conn.transaction()?;

        for table in &snapshot.tables {
            tx.execute_batch(&create_table_sql(table)).map_err(|e| {
                Error::restore(
                    &self.origin,
                    format!("cannot create table {:?}: {e}", table.name),
                )
            })?;

            let mut stmt = tx.prepare(&insert_sql(table)).map_err(|e| {
                Error::restore(
                    &self.origin,
                    format!("cannot insert into table {:?}: {e}", table.name),
                )
            })?;
            for (index, row) in table.rows.iter().enumerate() {
                stmt.execute(rusqlite::params_from_iter(row))
                    .map_err(|e| {
                        Error::restore(
                            &self.origin,
                            format!("row {} of table {:?}: {e}", index + 1, table.name),
                        )
                    })?;
            }

            debug!(table = %table.name, rows = table.rows.len(), "Restored table");
        }

        for sql in &snapshot.schema {
            tx.execute_batch(sql).map_err(|e| {
                Error::restore(&self.origin, format!("cannot create `{sql}`: {e}"))
            })?;
        }

        tx.commit()?;

        let stats = SnapshotStats::of(snapshot);
        info!(
            path = %self.origin.display(),
            tables = stats.tables,
            rows = stats.rows,
            "Restored database from snapshot"
        );
        Ok(stats)
    }
}

/// `CREATE TABLE` statement for a table.
///
/// Uses the recorded statement when present, otherwise builds one from the
/// column specs.
#[must_use]
pub fn create_table_sql(table: &TableSnapshot) -> String {
    if let Some(sql) = &table.sql {
        return sql.clone();
    }

    let mut keys: Vec<_> = table.columns.iter().filter(|c| c.primary_key > 0).collect();
    keys.sort_by_key(|c| c.primary_key);
    let inline_key = keys.len() == 1;

    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let mut def = quote_ident(&column.name);
            if !column.datatype.is_empty() {
                def.push(' ');
                def.push_str(&column.datatype);
            }
            if let Some(default) = &column.default {
                def.push_str(&format!(" DEFAULT {default}"));
            }
            if column.not_null {
                def.push_str(" NOT NULL");
            }
            if column.unique {
                def.push_str(" UNIQUE");
            }
            if inline_key && column.primary_key > 0 {
                def.push_str(" PRIMARY KEY");
                if column.autoincrement {
                    def.push_str(" AUTOINCREMENT");
                }
            }
            def
        })
        .collect();

    if keys.len() > 1 {
        let names: Vec<String> = keys.iter().map(|c| quote_ident(&c.name)).collect();
        defs.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }

    format!("CREATE TABLE {} ({})", quote_ident(&table.name), defs.join(", "))
}

/// Parameterized `INSERT` statement for a table.
#[must_use]
pub fn insert_sql(table: &TableSnapshot) -> String {
    let names: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&table.name),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Every statement a restore would run, with values inlined as literals.
///
/// Used by `restore --dry-run`. The script is executable as-is by the
/// `sqlite3` shell.
#[must_use]
pub fn render_statements(snapshot: &Snapshot) -> Vec<String> {
    let mut statements = vec!["BEGIN;".to_string()];

    for table in &snapshot.tables {
        statements.push(terminated(create_table_sql(table)));

        let names: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
        for row in &table.rows {
            let values: Vec<String> = row.iter().map(snapshot_literal).collect();
            statements.push(format!(
                "INSERT INTO {} ({}) VALUES ({});",
                quote_ident(&table.name),
                names.join(", "),
                values.join(", ")
            ));
        }
    }

    statements.extend(snapshot.schema.iter().cloned().map(terminated));
    statements.push("COMMIT;".to_string());
    statements
}

fn terminated(sql: String) -> String {
    if sql.trim_end().ends_with(';') {
        sql
    } else {
        sql + ";"
    }
}

/// Render a value as an SQL literal.
#[must_use]
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) if f.is_finite() => format!("{f:?}"),
        Value::Real(f) if *f > 0.0 => "9e999".to_string(),
        Value::Real(_) => "-9e999".to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(bytes) => hex_literal(bytes),
    }
}

fn snapshot_literal(value: &SnapshotValue) -> String {
    match value {
        SnapshotValue::Sql(value) => sql_literal(value),
        SnapshotValue::RawText(bytes) => format!("CAST({} AS TEXT)", hex_literal(bytes)),
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("X'{hex}'")
}
