//! Restore command implementation.
//!
//! Rebuilds the database from its snapshot. An existing database with tables
//! is only replaced with `--force`, after a timestamped backup copy has been
//! written next to it.

use crate::config::{resolve_db_path, resolve_snapshot_path};
use crate::error::{Error, Result};
use crate::snapshot::{backup_file, read_snapshot, remove_database, render_statements};
use crate::storage::schema::has_user_tables;
use crate::storage::{DumpPolicy, RestorePolicy, Session, SessionOptions};
use chrono::Local;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::info;

/// Execute the restore command.
///
/// # Errors
///
/// Returns `Error::Restore` for a malformed snapshot, `Error::InvalidArgument`
/// if the database already has tables and `force` is not set, and I/O or
/// database errors from replacing the file.
pub fn execute(
    force: bool,
    dry_run: bool,
    db_path: Option<&PathBuf>,
    snapshot_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path));
    let snapshot_path = resolve_snapshot_path(&db_path, snapshot_path.map(PathBuf::as_path))?;

    // Parse before anything is touched.
    let snapshot = read_snapshot(&snapshot_path)?;

    if dry_run {
        let statements = render_statements(&snapshot);
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "snapshot": snapshot_path.display().to_string(),
                "statements": statements,
            });
            println!("{}", serde_json::to_string(&output)?);
        } else {
            for statement in statements {
                println!("{statement}");
            }
        }
        return Ok(());
    }

    let mut backup = None;
    if database_has_tables(&db_path)? {
        if !force {
            return Err(Error::InvalidArgument(format!(
                "{} already has tables; pass --force to back it up and replace it",
                db_path.display()
            )));
        }
        let path = backup_file(&db_path, Local::now())?;
        info!(backup = %path.display(), "Backed up database before restore");
        remove_database(&db_path)?;
        backup = Some(path);
    }

    let options = SessionOptions {
        snapshot_path: Some(snapshot_path.clone()),
        restore: RestorePolicy::IfMissing,
        dump: DumpPolicy::Never,
        ..SessionOptions::default()
    };
    let session = Session::open_with(&db_path, options)?;
    let stats = session.restored().unwrap_or_default();
    session.close()?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "database": db_path.display().to_string(),
            "snapshot": snapshot_path.display().to_string(),
            "backup": backup.as_ref().map(|p| p.display().to_string()),
            "restored": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        if let Some(path) = &backup {
            println!("Backed up previous database to {}", path.display());
        }
        println!(
            "Restored {} rows in {} tables into {}",
            stats.rows,
            stats.tables,
            db_path.display()
        );
    }
    Ok(())
}

fn database_has_tables(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok(has_user_tables(&conn)?)
}
