//! Status command implementation.

use crate::config::{resolve_db_path, resolve_snapshot_path};
use crate::error::Result;
use crate::snapshot::{get_sync_status, print_status};
use std::path::PathBuf;

/// Execute the status command.
///
/// Neither file is created or modified.
///
/// # Errors
///
/// Returns an error if either file cannot be read.
pub fn execute(db_path: Option<&PathBuf>, snapshot_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path));
    let snapshot_path = resolve_snapshot_path(&db_path, snapshot_path.map(PathBuf::as_path))?;

    let status = get_sync_status(&db_path, &snapshot_path)?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
