//! Snapshot export (dump).
//!
//! The exporter reads every user table, its columns and its rows in a stable
//! order, and writes them to the snapshot file. The file always represents
//! the current state of the database; git tracks the history.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;
use crate::snapshot::file::{atomic_write, render, write_if_changed};
use crate::snapshot::types::{DumpOutcome, Snapshot, SnapshotStats, SnapshotValue, TableSnapshot};
use crate::storage::schema::{quote_ident, schema_objects, stable_order, table_columns, user_tables, TableInfo};

/// Exporter for snapshot files.
pub struct Exporter<'a> {
    conn: &'a Connection,
    output: PathBuf,
}

impl<'a> Exporter<'a> {
    /// Create a new exporter writing to `output`.
    #[must_use]
    pub fn new(conn: &'a Connection, output: &Path) -> Self {
        Self {
            conn,
            output: output.to_path_buf(),
        }
    }

    /// Get the output path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Read the whole database into a [`Snapshot`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if a catalog or table query fails.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        for info in user_tables(self.conn)? {
            snapshot.tables.push(self.dump_table(&info)?);
        }
        snapshot.schema = schema_objects(self.conn)?;

        Ok(snapshot)
    }

    fn dump_table(&self, info: &TableInfo) -> Result<TableSnapshot> {
        let columns = table_columns(self.conn, &info.name)?;
        let select_list = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select_list} FROM {} {}",
            quote_ident(&info.name),
            stable_order(info, &columns)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(SnapshotValue::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(table = %info.name, rows = rows.len(), "Dumped table");

        Ok(TableSnapshot {
            name: info.name.clone(),
            sql: info.sql.clone(),
            columns,
            rows,
        })
    }

    /// Dump the database to the snapshot file.
    ///
    /// Unless `force` is set, the file is left untouched when the rendered
    /// snapshot is identical to its current content.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if reading fails and `Error::Io` if the file
    /// cannot be written.
    pub fn export(&self, force: bool) -> Result<DumpOutcome> {
        let snapshot = self.snapshot()?;
        let stats = SnapshotStats::of(&snapshot);
        let text = render(&snapshot)?;

        let written = if force {
            atomic_write(&self.output, &text)?;
            true
        } else {
            write_if_changed(&self.output, &text)?
        };

        if written {
            info!(
                path = %self.output.display(),
                tables = stats.tables,
                rows = stats.rows,
                "Wrote snapshot"
            );
            Ok(DumpOutcome::Written(stats))
        } else {
            Ok(DumpOutcome::Unchanged(stats))
        }
    }
}
