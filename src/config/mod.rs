//! Configuration management.
//!
//! This module resolves the database path and derives the paired snapshot
//! path. The snapshot always sits next to the database with the extension
//! replaced by [`SNAPSHOT_EXTENSION`], so both git and file-system tooling
//! can find it without extra configuration:
//!
//! ```text
//! data/app.db   ->  data/app.json
//! data/app      ->  data/app.json
//! ```

use crate::error::{Error, Result};

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Extension used for snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Database used when neither a flag nor `JSQLON_DB` names one.
pub const DEFAULT_DB_PATH: &str = "data/data.db";

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `JSQLON_DB` environment variable
/// 3. [`DEFAULT_DB_PATH`], relative to the working directory
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit_path {
        return path.to_path_buf();
    }

    if let Ok(db_path) = std::env::var("JSQLON_DB") {
        if !db_path.trim().is_empty() {
            return PathBuf::from(db_path);
        }
    }

    PathBuf::from(DEFAULT_DB_PATH)
}

/// Derive the snapshot path for a database path.
///
/// # Errors
///
/// Returns `Error::Config` if the database path has no file name, or if the
/// derived path would be the database itself (a database named `*.json`).
pub fn snapshot_path_for(db_path: &Path) -> Result<PathBuf> {
    if db_path.file_name().is_none() {
        return Err(Error::Config(format!(
            "database path {} has no file name",
            db_path.display()
        )));
    }

    let snapshot = db_path.with_extension(SNAPSHOT_EXTENSION);
    ensure_distinct(db_path, &snapshot)?;
    Ok(snapshot)
}

/// Resolve the snapshot path: an explicit override wins, otherwise derive it.
///
/// # Errors
///
/// Returns `Error::Config` when the snapshot and database paths coincide.
pub fn resolve_snapshot_path(db_path: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => {
            ensure_distinct(db_path, path)?;
            Ok(path.to_path_buf())
        }
        None => snapshot_path_for(db_path),
    }
}

fn ensure_distinct(db_path: &Path, snapshot: &Path) -> Result<()> {
    if snapshot == db_path {
        return Err(Error::Config(format!(
            "snapshot path {} is the database itself",
            snapshot.display()
        )));
    }
    Ok(())
}

/// Path used to keep a copy of a database before it is replaced.
///
/// Format: `<db>.<YYYY-MM-DDTHHMM>.bak`, next to the database.
#[must_use]
pub fn backup_path_for(db_path: &Path, at: DateTime<Local>) -> PathBuf {
    let stamp = at.format("%Y-%m-%dT%H%M");
    let mut name = db_path.as_os_str().to_os_string();
    name.push(format!(".{stamp}.bak"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_path_replaces_extension() {
        assert_eq!(
            snapshot_path_for(Path::new("data/app.db")).unwrap(),
            PathBuf::from("data/app.json")
        );
        assert_eq!(
            snapshot_path_for(Path::new("app.sqlite3")).unwrap(),
            PathBuf::from("app.json")
        );
    }

    #[test]
    fn test_snapshot_path_without_extension() {
        assert_eq!(
            snapshot_path_for(Path::new("data/app")).unwrap(),
            PathBuf::from("data/app.json")
        );
    }

    #[test]
    fn test_snapshot_path_rejects_json_database() {
        let err = snapshot_path_for(Path::new("data/app.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_explicit_snapshot_path_wins() {
        let path =
            resolve_snapshot_path(Path::new("app.db"), Some(Path::new("dumps/app.json"))).unwrap();
        assert_eq!(path, PathBuf::from("dumps/app.json"));

        assert!(resolve_snapshot_path(Path::new("app.db"), Some(Path::new("app.db"))).is_err());
    }

    #[test]
    fn test_resolve_db_path_explicit() {
        assert_eq!(
            resolve_db_path(Some(Path::new("/tmp/x.db"))),
            PathBuf::from("/tmp/x.db")
        );
    }

    #[test]
    fn test_backup_path_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(
            backup_path_for(Path::new("data/app.db"), at),
            PathBuf::from("data/app.db.2024-03-09T1405.bak")
        );
    }
}
