//! CLI integration tests.
//!
//! stdout is not a terminal under the test harness, so every command runs in
//! JSON mode.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn jsqlon(db: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("jsqlon");
    cmd.env_remove("JSQLON_DB")
        .env_remove("JSQLON_SNAPSHOT")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(db);
    cmd
}

fn scratch() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("data.db");
    (temp_dir, db)
}

fn seed(db: &Path) {
    jsqlon(db)
        .args(["query", "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT)"])
        .assert()
        .success();
    jsqlon(db)
        .args(["query", "INSERT INTO people (name) VALUES (?1)", "-p", "alice"])
        .assert()
        .success();
}

#[test]
fn test_help() {
    cargo_bin_cmd!("jsqlon")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("dump"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn test_version_json() {
    cargo_bin_cmd!("jsqlon")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\""))
        .stdout(predicate::str::contains("\"snapshot_format\":1"))
        .stdout(predicate::str::contains("\"sqlite\":\"3."));
}

#[test]
fn test_query_writes_snapshot_and_returns_rows() {
    let (temp_dir, db) = scratch();
    seed(&db);

    let snapshot = fs::read_to_string(temp_dir.path().join("data.json")).unwrap();
    assert!(snapshot.contains("[1,\"alice\"]"), "{snapshot}");

    jsqlon(&db)
        .args(["query", "SELECT * FROM people"])
        .assert()
        .success()
        .stdout("{\"id\":1,\"name\":\"alice\"}\n");

    jsqlon(&db)
        .args(["query", "SELECT * FROM people", "--positional"])
        .assert()
        .success()
        .stdout("[1,\"alice\"]\n");
}

#[test]
fn test_sync_restores_missing_database() {
    let (_temp_dir, db) = scratch();
    seed(&db);
    fs::remove_file(&db).unwrap();

    jsqlon(&db)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows\":1"))
        .stdout(predicate::str::contains("\"result\":\"skipped\""));
    assert!(db.exists());

    jsqlon(&db)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\":\"in_sync\""));
}

#[test]
fn test_sync_loads_newer_pulled_snapshot() {
    let (temp_dir, db) = scratch();
    seed(&db);

    // Stand-in for a snapshot pulled from version control after the last dump.
    let snapshot_path = temp_dir.path().join("data.json");
    let pulled = fs::read_to_string(&snapshot_path).unwrap().replace("\"alice\"", "\"bob\"");
    std::thread::sleep(std::time::Duration::from_millis(1100));
    fs::write(&snapshot_path, &pulled).unwrap();

    jsqlon(&db)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows\":1"));

    assert_eq!(fs::read_to_string(&snapshot_path).unwrap(), pulled);
    jsqlon(&db)
        .args(["query", "SELECT name FROM people"])
        .assert()
        .success()
        .stdout("{\"name\":\"bob\"}\n");

    let backups = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .count();
    assert_eq!(backups, 1);
}

#[test]
fn test_malformed_snapshot_fails_without_creating_database() {
    let (temp_dir, db) = scratch();
    fs::write(temp_dir.path().join("data.json"), "{oops").unwrap();

    jsqlon(&db)
        .arg("sync")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("RESTORE_ERROR"));
    assert!(!db.exists());
}

#[test]
fn test_query_error_exit_code() {
    let (_temp_dir, db) = scratch();

    jsqlon(&db)
        .args(["query", "SELEC 1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("QUERY_ERROR"));
}

#[test]
fn test_restore_dry_run_prints_statements() {
    let (_temp_dir, db) = scratch();
    seed(&db);
    fs::remove_file(&db).unwrap();

    jsqlon(&db)
        .args(["restore", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE"))
        .stdout(predicate::str::contains("'alice'"));
    assert!(!db.exists());
}

#[test]
fn test_restore_requires_force_for_populated_database() {
    let (temp_dir, db) = scratch();
    seed(&db);

    jsqlon(&db)
        .arg("restore")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("--force"));

    jsqlon(&db)
        .args(["restore", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"backup\":\""));

    let backups = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .count();
    assert_eq!(backups, 1);

    jsqlon(&db)
        .args(["query", "SELECT name FROM people"])
        .assert()
        .success()
        .stdout("{\"name\":\"alice\"}\n");
}

#[test]
fn test_dump_with_explicit_snapshot_path() {
    let (temp_dir, db) = scratch();
    seed(&db);
    let other = temp_dir.path().join("exports").join("people.json");

    jsqlon(&db)
        .arg("--snapshot")
        .arg(&other)
        .arg("dump")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"result\":\"written\""));

    assert!(other.exists());
}

#[test]
fn test_completions() {
    cargo_bin_cmd!("jsqlon")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jsqlon"));
}
