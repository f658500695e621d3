//! Snapshot file operations.
//!
//! This module owns the on-disk text of a snapshot:
//! - Rendering: deterministic, diff-friendly JSON (one row per line)
//! - Parsing: JSON back to a validated [`Snapshot`]
//! - Atomic writes: write to temp file, sync to disk, then rename

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::config::backup_path_for;
use crate::error::{Error, Result};
use crate::snapshot::hash::{content_hash, has_changed};
use crate::snapshot::types::{FORMAT_VERSION, Snapshot};

/// Render a snapshot to its canonical text.
///
/// The output is valid JSON with two-space indentation, one column spec and
/// one row per line, and a trailing newline. The same snapshot always renders
/// to the same bytes.
///
/// # Errors
///
/// Returns an error if a value cannot be serialized.
pub fn render(snapshot: &Snapshot) -> Result<String> {
    let mut out = String::from("{\n");
    out.push_str(&format!("  \"format\": {},\n", snapshot.format));

    if snapshot.tables.is_empty() {
        out.push_str("  \"tables\": {}");
    } else {
        out.push_str("  \"tables\": {\n");
        for (i, table) in snapshot.tables.iter().enumerate() {
            out.push_str(&format!("    {}: {{\n", serde_json::to_string(&table.name)?));
            if let Some(sql) = &table.sql {
                out.push_str(&format!("      \"sql\": {},\n", serde_json::to_string(sql)?));
            }

            let columns = table
                .columns
                .iter()
                .map(serde_json::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            push_list(&mut out, 6, "columns", &columns);
            out.push_str(",\n");

            let rows = table
                .rows
                .iter()
                .map(serde_json::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            push_list(&mut out, 6, "rows", &rows);
            out.push('\n');

            out.push_str("    }");
            out.push_str(separator(i, snapshot.tables.len()));
        }
        out.push_str("  }");
    }

    if !snapshot.schema.is_empty() {
        out.push_str(",\n");
        let schema = snapshot
            .schema
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        push_list(&mut out, 2, "schema", &schema);
    }

    out.push_str("\n}\n");
    Ok(out)
}

fn push_list(out: &mut String, indent: usize, key: &str, items: &[String]) {
    let pad = " ".repeat(indent);
    if items.is_empty() {
        out.push_str(&format!("{pad}\"{key}\": []"));
        return;
    }

    out.push_str(&format!("{pad}\"{key}\": [\n"));
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{pad}  {item}"));
        out.push_str(separator(i, items.len()));
    }
    out.push_str(&format!("{pad}]"));
}

fn separator(index: usize, len: usize) -> &'static str {
    if index + 1 < len { ",\n" } else { "\n" }
}

/// Parse and validate snapshot text.
///
/// `origin` is only used to label errors.
///
/// # Errors
///
/// Returns `Error::Restore` if the text is not valid snapshot JSON, uses a
/// newer format version, or contains a row whose width does not match its
/// table's columns.
pub fn parse(text: &str, origin: &Path) -> Result<Snapshot> {
    let snapshot: Snapshot =
        serde_json::from_str(text).map_err(|e| Error::restore(origin, e.to_string()))?;

    if snapshot.format > FORMAT_VERSION {
        return Err(Error::restore(
            origin,
            format!(
                "snapshot format {} is newer than supported format {FORMAT_VERSION}",
                snapshot.format
            ),
        ));
    }

    for table in &snapshot.tables {
        if table.columns.is_empty() {
            return Err(Error::restore(
                origin,
                format!("table {:?} has no columns", table.name),
            ));
        }
        if let Some(pos) = table.rows.iter().position(|r| r.len() != table.columns.len()) {
            return Err(Error::restore(
                origin,
                format!(
                    "row {} of table {:?} has {} values, expected {}",
                    pos + 1,
                    table.name,
                    table.rows[pos].len(),
                    table.columns.len()
                ),
            ));
        }
    }

    Ok(snapshot)
}

/// Read and parse a snapshot file.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read, `Error::Restore` if its
/// content is malformed.
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let text = fs::read_to_string(path).map_err(Error::io(path))?;
    parse(&text, path)
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file (same path with `.tmp` appended)
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let temp_path = with_suffix(path, ".tmp");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(Error::io(parent))?;
    }

    {
        let file = File::create(&temp_path).map_err(Error::io(&temp_path))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(content.as_bytes())
            .map_err(Error::io(&temp_path))?;
        writer.flush().map_err(Error::io(&temp_path))?;
        writer.get_ref().sync_all().map_err(Error::io(&temp_path))?;
    }

    fs::rename(&temp_path, path).map_err(Error::io(path))?;

    Ok(())
}

/// Write rendered snapshot text unless the file already holds the same content.
///
/// Returns `true` if the file was written.
///
/// # Errors
///
/// Returns an error if the existing file cannot be read or the write fails.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    let stored_hash = match fs::read_to_string(path) {
        Ok(existing) => Some(content_hash(&existing)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(Error::io(path)(e)),
    };

    if !has_changed(&content_hash(content), stored_hash.as_deref()) {
        debug!(path = %path.display(), "Snapshot unchanged, not rewriting");
        return Ok(false);
    }

    atomic_write(path, content)?;
    Ok(true)
}

/// Copy a database file aside before it is replaced.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn backup_file(path: &Path, at: DateTime<Local>) -> Result<PathBuf> {
    let backup = backup_path_for(path, at);
    fs::copy(path, &backup).map_err(Error::io(&backup))?;
    Ok(backup)
}

/// Remove a database file together with its journal files.
///
/// Missing files are ignored.
///
/// # Errors
///
/// Returns an error if an existing file cannot be removed.
pub fn remove_database(path: &Path) -> Result<()> {
    let candidates = [
        path.to_path_buf(),
        with_suffix(path, "-journal"),
        with_suffix(path, "-wal"),
        with_suffix(path, "-shm"),
    ];
    for candidate in &candidates {
        match fs::remove_file(candidate) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(candidate)(e)),
        }
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::types::{ColumnSpec, SnapshotValue, TableSnapshot};
    use rusqlite::types::Value;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        Snapshot {
            tables: vec![TableSnapshot {
                name: "Table2".into(),
                sql: Some("CREATE TABLE Table2 (ID INTEGER PRIMARY KEY, Name TEXT)".into()),
                columns: vec![
                    ColumnSpec {
                        name: "ID".into(),
                        datatype: "INTEGER".into(),
                        primary_key: 1,
                        ..ColumnSpec::default()
                    },
                    ColumnSpec {
                        name: "Name".into(),
                        datatype: "TEXT".into(),
                        ..ColumnSpec::default()
                    },
                ],
                rows: vec![
                    vec![
                        SnapshotValue::Sql(Value::Integer(1)),
                        SnapshotValue::Sql(Value::Text("a".into())),
                    ],
                    vec![SnapshotValue::Sql(Value::Integer(2)), SnapshotValue::Sql(Value::Null)],
                ],
            }],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_render_layout() {
        let text = render(&sample()).unwrap();
        let expected = r#"{
  "format": 1,
  "tables": {
    "Table2": {
      "sql": "CREATE TABLE Table2 (ID INTEGER PRIMARY KEY, Name TEXT)",
      "columns": [
        {"name":"ID","datatype":"INTEGER","primary_key":1},
        {"name":"Name","datatype":"TEXT"}
      ],
      "rows": [
        [1,"a"],
        [2,null]
      ]
    }
  }
}
"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_matches_serde_model() {
        let mut snapshot = sample();
        snapshot.schema.push("CREATE INDEX idx ON Table2 (Name)".into());
        snapshot.tables.push(TableSnapshot {
            name: "empty".into(),
            columns: vec![ColumnSpec {
                name: "x".into(),
                ..ColumnSpec::default()
            }],
            ..TableSnapshot::default()
        });

        let text = render(&snapshot).unwrap();
        let rendered: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(rendered, serde_json::to_value(&snapshot).unwrap());
        assert_eq!(parse(&text, Path::new("t.json")).unwrap(), snapshot);
    }

    #[test]
    fn test_render_empty_snapshot() {
        let text = render(&Snapshot::default()).unwrap();
        assert_eq!(text, "{\n  \"format\": 1,\n  \"tables\": {}\n}\n");
        assert!(parse(&text, Path::new("t.json")).unwrap().tables.is_empty());
    }

    #[test]
    fn test_parse_malformed_is_restore_error() {
        let err = parse("{\"tables\": {", Path::new("t.json")).unwrap_err();
        assert!(matches!(err, Error::Restore { .. }));
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        let text = r#"{"tables":{"t":{"columns":[{"name":"a"},{"name":"b"}],"rows":[[1,2],[3]]}}}"#;
        let err = parse(text, Path::new("t.json")).unwrap_err();
        assert!(err.to_string().contains("row 2"), "{err}");
    }

    #[test]
    fn test_parse_rejects_future_format() {
        let err = parse(r#"{"format":99,"tables":{}}"#, Path::new("t.json")).unwrap_err();
        assert!(matches!(err, Error::Restore { .. }));
    }

    #[test]
    fn test_read_snapshot_missing_file_is_io_error() {
        let err = read_snapshot(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("test.json");

        atomic_write(&path, "line 1\nline 2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "line 1\nline 2\n");
        assert!(!with_suffix(&path, ".tmp").exists());
    }

    #[test]
    fn test_write_if_changed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");

        assert!(write_if_changed(&path, "one\n").unwrap());
        assert!(!write_if_changed(&path, "one\n").unwrap());
        assert!(write_if_changed(&path, "two\n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");
    }

    #[test]
    fn test_backup_and_remove_database() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("app.db");
        fs::write(&db, b"data").unwrap();
        fs::write(with_suffix(&db, "-journal"), b"j").unwrap();

        let backup = backup_file(&db, Local::now()).unwrap();
        assert_eq!(fs::read(&backup).unwrap(), b"data");

        remove_database(&db).unwrap();
        assert!(!db.exists());
        assert!(!with_suffix(&db, "-journal").exists());
        assert!(backup.exists());
        // Removing twice is fine.
        remove_database(&db).unwrap();
    }
}
