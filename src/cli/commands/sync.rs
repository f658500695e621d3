//! Sync command implementation.
//!
//! Opens a session and closes it again. Whichever side changed last wins:
//! a missing or older database is rebuilt from the snapshot (the old file is
//! kept as a `.bak`), otherwise the snapshot is rewritten when the database
//! content differs from it. Pulling a snapshot from version control and
//! running `jsqlon sync` therefore loads it instead of overwriting it.

use crate::config::resolve_db_path;
use crate::error::Result;
use crate::snapshot::DumpOutcome;
use crate::storage::{RestorePolicy, Session};
use std::path::PathBuf;

/// Execute the sync command.
///
/// # Errors
///
/// Returns errors from opening or closing the session.
pub fn execute(db_path: Option<&PathBuf>, snapshot_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path));
    let options = super::session_options(snapshot_path).restore(RestorePolicy::IfNewer);

    let session = Session::open_with(&db_path, options)?;
    let restored = session.restored();
    let snapshot = session.snapshot_path().to_path_buf();
    let outcome = session.close()?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "database": db_path.display().to_string(),
            "snapshot": snapshot.display().to_string(),
            "restored": restored,
            "dump": outcome,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if let Some(stats) = restored {
        println!(
            "Restored {} rows in {} tables from {}",
            stats.rows,
            stats.tables,
            snapshot.display()
        );
    }
    print_outcome(&outcome, &snapshot);
    Ok(())
}

/// Print a one-line summary of a dump.
pub(super) fn print_outcome(outcome: &DumpOutcome, snapshot: &std::path::Path) {
    match outcome {
        DumpOutcome::Written(stats) => println!(
            "Wrote {} rows in {} tables to {}",
            stats.rows,
            stats.tables,
            snapshot.display()
        ),
        DumpOutcome::Unchanged(_) => println!("Snapshot up to date: {}", snapshot.display()),
        DumpOutcome::Skipped => println!("No changes since restore, snapshot left as is."),
    }
}
