//! Sync status.
//!
//! Compares a database with its snapshot without modifying either: the
//! database is opened read-only and rendered in memory, the snapshot is
//! parsed and re-rendered, and the two content hashes are compared. When
//! contents differ, file modification times decide which side is newer.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use colored::Colorize;
use rusqlite::{Connection, OpenFlags};

use crate::error::{Error, Result};
use crate::snapshot::export::Exporter;
use crate::snapshot::file::{read_snapshot, render};
use crate::snapshot::hash::content_hash;
use crate::snapshot::types::{SyncState, SyncStatus};

/// Get the current sync status of a database and its snapshot.
///
/// # Errors
///
/// Returns `Error::Database` if the database cannot be read, `Error::Restore`
/// if the snapshot is malformed, and `Error::Io` for file metadata failures.
pub fn get_sync_status(db_path: &Path, snapshot_path: &Path) -> Result<SyncStatus> {
    let database_modified = modified(db_path)?;
    let snapshot_modified = modified(snapshot_path)?;

    let database_hash = match database_modified {
        Some(_) => Some(database_hash(db_path)?),
        None => None,
    };
    let snapshot_hash = match snapshot_modified {
        Some(_) => Some(content_hash(&render(&read_snapshot(snapshot_path)?)?)),
        None => None,
    };

    let state = match (database_modified, snapshot_modified) {
        (None, None) => SyncState::Empty,
        (Some(_), None) => SyncState::SnapshotMissing,
        (None, Some(_)) => SyncState::DatabaseMissing,
        (Some(db_time), Some(snap_time)) => {
            if database_hash == snapshot_hash {
                SyncState::InSync
            } else if snap_time > db_time {
                SyncState::SnapshotNewer
            } else {
                SyncState::DatabaseNewer
            }
        }
    };

    Ok(SyncStatus {
        database: db_path.display().to_string(),
        snapshot: snapshot_path.display().to_string(),
        state,
        database_modified: database_modified.map(rfc3339),
        snapshot_modified: snapshot_modified.map(rfc3339),
        database_hash,
        snapshot_hash,
    })
}

fn database_hash(db_path: &Path) -> Result<String> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let snapshot = Exporter::new(&conn, Path::new("")).snapshot()?;
    Ok(content_hash(&render(&snapshot)?))
}

fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some).map_err(Error::io(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path)(e)),
    }
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    println!("{}", "Files:".blue().bold());
    println!(
        "  Database: {} ({})",
        status.database,
        status.database_modified.as_deref().unwrap_or("missing")
    );
    println!(
        "  Snapshot: {} ({})",
        status.snapshot,
        status.snapshot_modified.as_deref().unwrap_or("missing")
    );
    println!();

    let state = status.state.to_string();
    let state = match status.state {
        SyncState::InSync => state.green(),
        SyncState::SnapshotNewer | SyncState::DatabaseNewer => state.yellow(),
        SyncState::SnapshotMissing | SyncState::DatabaseMissing | SyncState::Empty => state.dimmed(),
    };
    println!("{} {state}", "State:".blue().bold());

    match status.state {
        SyncState::SnapshotNewer => {
            println!();
            println!("  Run `jsqlon restore --force` to rebuild the database from the snapshot.");
        }
        SyncState::DatabaseNewer | SyncState::SnapshotMissing => {
            println!();
            println!("  Run `jsqlon dump` to update the snapshot.");
        }
        SyncState::DatabaseMissing => {
            println!();
            println!("  Run `jsqlon sync` to create the database from the snapshot.");
        }
        SyncState::InSync | SyncState::Empty => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::file::atomic_write;
    use tempfile::TempDir;

    fn make_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE t (x); INSERT INTO t VALUES (1);")
            .unwrap();
    }

    #[test]
    fn test_status_empty() {
        let temp_dir = TempDir::new().unwrap();
        let status = get_sync_status(
            &temp_dir.path().join("a.db"),
            &temp_dir.path().join("a.json"),
        )
        .unwrap();
        assert_eq!(status.state, SyncState::Empty);
        assert!(status.database_hash.is_none());
    }

    #[test]
    fn test_status_missing_sides() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("a.db");
        let snap = temp_dir.path().join("a.json");

        make_db(&db);
        assert_eq!(
            get_sync_status(&db, &snap).unwrap().state,
            SyncState::SnapshotMissing
        );

        let other_db = temp_dir.path().join("b.db");
        atomic_write(&snap, "{\"tables\":{}}").unwrap();
        assert_eq!(
            get_sync_status(&other_db, &snap).unwrap().state,
            SyncState::DatabaseMissing
        );
        assert!(!other_db.exists(), "status must not create the database");
    }

    #[test]
    fn test_status_in_sync_ignores_layout() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("a.db");
        let snap = temp_dir.path().join("a.json");
        make_db(&db);

        // Same content as the database, but compact instead of canonical.
        let conn = Connection::open(&db).unwrap();
        let snapshot = Exporter::new(&conn, &snap).snapshot().unwrap();
        drop(conn);
        atomic_write(&snap, &serde_json::to_string(&snapshot).unwrap()).unwrap();

        let status = get_sync_status(&db, &snap).unwrap();
        assert_eq!(status.state, SyncState::InSync);
        assert_eq!(status.database_hash, status.snapshot_hash);
    }

    #[test]
    fn test_status_detects_difference() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("a.db");
        let snap = temp_dir.path().join("a.json");
        make_db(&db);
        atomic_write(&snap, "{\"tables\":{}}").unwrap();

        let status = get_sync_status(&db, &snap).unwrap();
        assert!(matches!(
            status.state,
            SyncState::SnapshotNewer | SyncState::DatabaseNewer
        ));
    }

    #[test]
    fn test_status_malformed_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("a.db");
        let snap = temp_dir.path().join("a.json");
        make_db(&db);
        atomic_write(&snap, "not json").unwrap();

        assert!(matches!(
            get_sync_status(&db, &snap),
            Err(Error::Restore { .. })
        ));
    }
}
