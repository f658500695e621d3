//! JSON snapshot operations.
//!
//! This module keeps a git-friendly text image of an SQLite database:
//!
//! - **Export**: every user table and row → snapshot file (dump)
//! - **Import**: snapshot file → empty database (restore)
//! - **Hashing**: SHA256 of the rendered text for change detection
//! - **Status**: compare a database with its snapshot
//!
//! # File Format
//!
//! One JSON document per database, tables keyed by name, one row per line:
//!
//! ```json
//! {
//!   "format": 1,
//!   "tables": {
//!     "Table2": {
//!       "sql": "CREATE TABLE Table2 (ID INTEGER PRIMARY KEY, Name TEXT)",
//!       "columns": [
//!         {"name":"ID","datatype":"INTEGER","primary_key":1},
//!         {"name":"Name","datatype":"TEXT"}
//!       ],
//!       "rows": [
//!         [1,"a"],
//!         [2,"b"]
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use jsqlon::snapshot::{Exporter, Importer, read_snapshot};
//!
//! let outcome = Exporter::new(&conn, &snapshot_path).export(false)?;
//!
//! let snapshot = read_snapshot(&snapshot_path)?;
//! Importer::new(&mut fresh_conn, &snapshot_path).import(&snapshot)?;
//! ```

mod export;
mod file;
mod hash;
mod import;
mod status;
mod types;

pub use export::Exporter;
pub use file::{
    atomic_write, backup_file, parse, read_snapshot, remove_database, render, write_if_changed,
};
pub use hash::{content_hash, has_changed};
pub use import::{Importer, create_table_sql, insert_sql, render_statements, sql_literal};
pub use status::{get_sync_status, print_status};
pub use types::{
    ColumnSpec, DumpOutcome, FORMAT_VERSION, Snapshot, SnapshotStats, SnapshotValue, SyncState,
    SyncStatus, TableSnapshot,
};
