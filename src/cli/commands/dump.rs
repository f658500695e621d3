//! Dump command implementation.

use crate::config::resolve_db_path;
use crate::error::Result;
use crate::storage::{DumpPolicy, Session};
use std::path::PathBuf;

/// Execute the dump command: rewrite the snapshot from the database.
///
/// # Errors
///
/// Returns errors from opening the session or writing the snapshot.
pub fn execute(db_path: Option<&PathBuf>, snapshot_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path));
    let options = super::session_options(snapshot_path).dump(DumpPolicy::Always);

    let session = Session::open_with(&db_path, options)?;
    let snapshot = session.snapshot_path().to_path_buf();
    let outcome = session.close()?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "database": db_path.display().to_string(),
            "snapshot": snapshot.display().to_string(),
            "dump": outcome,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        super::sync::print_outcome(&outcome, &snapshot);
    }
    Ok(())
}
