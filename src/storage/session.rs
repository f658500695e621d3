//! Database sessions.
//!
//! A [`Session`] owns one SQLite connection and keeps the database in step
//! with its snapshot file:
//!
//! 1. **Open**: if the snapshot exists and the database is missing or has no
//!    tables, the snapshot is restored into it
//! 2. **Query**: statements run against the open connection; anything that
//!    is not read-only marks the session dirty
//! 3. **Close**: the database is dumped to the snapshot, then the connection
//!    is closed
//!
//! Close runs on every exit path: explicitly through [`Session::close`],
//! through [`Session::with`] when the body fails, or from `Drop`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use rusqlite::{Connection, Params, Row};
use tracing::{debug, error, info, warn};

use crate::config::resolve_snapshot_path;
use crate::error::{Error, Result};
use crate::snapshot::{
    DumpOutcome, Exporter, Importer, SnapshotStats, SyncState, backup_file, get_sync_status,
    read_snapshot, remove_database,
};
use crate::storage::factory::{self, Columns, Record};
use crate::storage::schema::has_user_tables;

/// When to populate the database from its snapshot on open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Never restore.
    Never,
    /// Restore when the database is missing or has no tables.
    #[default]
    IfMissing,
    /// Also restore when the snapshot differs and is newer than the
    /// database. The database is copied to `<db>.<timestamp>.bak` first.
    IfNewer,
}

/// When to write the snapshot on close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DumpPolicy {
    /// Never write the snapshot.
    Never,
    /// Skip the dump when nothing changed since the last restore or dump,
    /// and skip the write when the snapshot text is unchanged.
    #[default]
    OnChange,
    /// Always rewrite the snapshot.
    Always,
}

/// Options for [`Session::open_with`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Snapshot location. Derived from the database path when `None`.
    pub snapshot_path: Option<PathBuf>,
    pub restore: RestorePolicy,
    pub dump: DumpPolicy,
    pub busy_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            restore: RestorePolicy::default(),
            dump: DumpPolicy::default(),
            // Default 5 second timeout
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn restore(mut self, policy: RestorePolicy) -> Self {
        self.restore = policy;
        self
    }

    #[must_use]
    pub fn dump(mut self, policy: DumpPolicy) -> Self {
        self.dump = policy;
        self
    }
}

enum RestorePlan {
    Skip,
    Restore,
    Replace,
}

/// An open database paired with its snapshot file.
#[derive(Debug)]
pub struct Session {
    /// `None` only once the session has been closed.
    conn: Option<Connection>,
    path: PathBuf,
    snapshot_path: PathBuf,
    dump_policy: DumpPolicy,
    restored: Option<SnapshotStats>,
    /// Whether the database may differ from the snapshot.
    dirty: bool,
}

impl Session {
    /// Open a session with default options.
    ///
    /// # Errors
    ///
    /// See [`Session::open_with`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, SessionOptions::default())
    }

    /// Open a session.
    ///
    /// Creates the database (and its parent directories) if needed, then
    /// restores from the snapshot according to `options.restore`. A failed
    /// restore rolls back, and a database file created by this call is
    /// removed again.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the snapshot path is the database path
    /// - `Error::Database` if the connection cannot be opened
    /// - `Error::Restore` if the snapshot is malformed or cannot be inserted
    /// - `Error::Io` if files cannot be read, created or removed
    pub fn open_with(path: impl AsRef<Path>, options: SessionOptions) -> Result<Self> {
        let path = path.as_ref();
        let snapshot_path = resolve_snapshot_path(path, options.snapshot_path.as_deref())?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(Error::io(parent))?;
        }

        let existed = path.exists();
        if !existed {
            info!(path = %path.display(), "SQLite database does not exist yet");
        }
        let mut conn = open_connection(path, &options)?;

        let plan = match plan_restore(&conn, path, &snapshot_path, options.restore) {
            Ok(plan) => plan,
            Err(e) => return Err(abandon(conn, path, existed, e)),
        };

        let restored = match plan {
            RestorePlan::Skip => None,
            RestorePlan::Restore => {
                let result = read_snapshot(&snapshot_path)
                    .and_then(|snapshot| Importer::new(&mut conn, &snapshot_path).import(&snapshot));
                match result {
                    Ok(stats) => Some(stats),
                    Err(e) => return Err(abandon(conn, path, existed, e)),
                }
            }
            RestorePlan::Replace => {
                // Validate the snapshot before touching the database.
                let snapshot = read_snapshot(&snapshot_path)?;
                close_connection(conn)?;

                let backup = backup_file(path, Local::now())?;
                info!(backup = %backup.display(), "Snapshot is newer than database, replacing it");
                remove_database(path)?;

                conn = open_connection(path, &options)?;
                match Importer::new(&mut conn, &snapshot_path).import(&snapshot) {
                    Ok(stats) => Some(stats),
                    Err(e) => {
                        warn!(backup = %backup.display(), "Restore failed, previous database kept as backup");
                        return Err(abandon(conn, path, false, e));
                    }
                }
            }
        };

        Ok(Self {
            conn: Some(conn),
            path: path.to_path_buf(),
            snapshot_path,
            dump_policy: options.dump,
            dirty: restored.is_none(),
            restored,
        })
    }

    /// Run `f` inside a session, closing it on every exit path.
    ///
    /// If `f` fails the session is still closed (and dumped); the error from
    /// `f` is returned and a close error is only logged.
    ///
    /// # Errors
    ///
    /// Returns errors from opening, from `f`, or from closing.
    pub fn with<T, F>(path: impl AsRef<Path>, options: SessionOptions, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut session = Self::open_with(path, options)?;
        match f(&mut session) {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(close_err) = session.close() {
                    warn!(error = %close_err, "Failed to close session after error");
                }
                Err(e)
            }
        }
    }

    /// Run a query and return every row as a name-keyed [`Record`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Query` if the statement fails.
    pub fn query<P: Params>(&mut self, sql: &str, params: P) -> Result<Vec<Record>> {
        self.query_with(sql, params, factory::named)
    }

    /// Run a query and shape every row with `factory`.
    ///
    /// Rows are returned in the order the engine produces them.
    ///
    /// # Errors
    ///
    /// Returns `Error::Query` if the statement or the factory fails.
    pub fn query_with<T, P, F>(&mut self, sql: &str, params: P, mut factory: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Columns, &Row<'_>) -> rusqlite::Result<T>,
    {
        let (rows, mutates) = {
            let mut stmt = self.conn().prepare(sql).map_err(Error::query(sql))?;
            let columns = Columns::new(stmt.column_names().into_iter().map(String::from).collect());
            let mutates = !stmt.readonly();
            let rows = stmt
                .query_map(params, |row| factory(&columns, row))
                .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<T>>>())
                .map_err(Error::query(sql));
            (rows, mutates)
        };

        if mutates {
            self.dirty = true;
        }
        rows
    }

    /// Execute a single statement, returning the number of changed rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::Query` if the statement fails.
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Result<usize> {
        let (changed, mutates) = {
            let mut stmt = self.conn().prepare(sql).map_err(Error::query(sql))?;
            let mutates = !stmt.readonly();
            (stmt.execute(params).map_err(Error::query(sql)), mutates)
        };

        if mutates {
            self.dirty = true;
        }
        changed
    }

    /// Execute several statements separated by semicolons.
    ///
    /// # Errors
    ///
    /// Returns `Error::Query` if any statement fails.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.dirty = true;
        self.conn().execute_batch(sql).map_err(Error::query(sql))
    }

    /// Dump the database to the snapshot file now.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` or `Error::Io` if the dump fails.
    pub fn dump(&mut self, force: bool) -> Result<DumpOutcome> {
        let outcome = Exporter::new(self.conn(), &self.snapshot_path).export(force)?;
        self.dirty = false;
        Ok(outcome)
    }

    /// Dump (per the session's [`DumpPolicy`]) and close the connection.
    ///
    /// A transaction still open is rolled back first, so the snapshot only
    /// holds committed data. The connection is closed even if the dump fails.
    ///
    /// # Errors
    ///
    /// Returns the dump error, or `Error::Database` if closing fails.
    pub fn close(mut self) -> Result<DumpOutcome> {
        self.finish()
    }

    fn finish(&mut self) -> Result<DumpOutcome> {
        let Some(conn) = self.conn.take() else {
            return Ok(DumpOutcome::Skipped);
        };

        // Uncommitted changes die with the connection; keep them out of the
        // snapshot too.
        let rolled_back = if conn.is_autocommit() {
            Ok(())
        } else {
            warn!(path = %self.path.display(), "Rolling back transaction left open at close");
            conn.execute_batch("ROLLBACK").map_err(Error::query("ROLLBACK"))
        };

        let dumped = rolled_back.and_then(|()| match self.dump_policy {
            DumpPolicy::Never => Ok(DumpOutcome::Skipped),
            DumpPolicy::OnChange if !self.dirty => {
                debug!(path = %self.snapshot_path.display(), "No changes since last sync, skipping dump");
                Ok(DumpOutcome::Skipped)
            }
            DumpPolicy::OnChange => Exporter::new(&conn, &self.snapshot_path).export(false),
            DumpPolicy::Always => Exporter::new(&conn, &self.snapshot_path).export(true),
        });
        let closed = close_connection(conn);

        match (dumped, closed) {
            (Ok(outcome), Ok(())) => {
                self.dirty = false;
                Ok(outcome)
            }
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Failed to close connection after dump error");
                Err(e)
            }
        }
    }

    /// The underlying connection.
    ///
    /// Changes made through it are not tracked; call [`Session::mark_dirty`]
    /// afterwards so they are dumped on close.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.conn()
    }

    fn conn(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("connection is open until the session is consumed")
    }

    /// Force the next close to dump.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the database may differ from the snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Counts from the restore performed on open, if any.
    #[must_use]
    pub fn restored(&self) -> Option<SnapshotStats> {
        self.restored
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.conn.is_none() {
            return;
        }
        if let Err(e) = self.finish() {
            error!(path = %self.path.display(), error = %e, "Failed to sync snapshot on drop");
        }
    }
}

fn open_connection(path: &Path, options: &SessionOptions) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(options.busy_timeout)?;
    Ok(conn)
}

fn close_connection(conn: Connection) -> Result<()> {
    conn.close().map_err(|(_, e)| Error::Database(e))
}

fn plan_restore(
    conn: &Connection,
    path: &Path,
    snapshot_path: &Path,
    policy: RestorePolicy,
) -> Result<RestorePlan> {
    if policy == RestorePolicy::Never || !snapshot_path.exists() {
        return Ok(RestorePlan::Skip);
    }

    if !has_user_tables(conn)? {
        info!(snapshot = %snapshot_path.display(), "Database is empty, restoring from snapshot");
        return Ok(RestorePlan::Restore);
    }

    if policy == RestorePolicy::IfNewer
        && get_sync_status(path, snapshot_path)?.state == SyncState::SnapshotNewer
    {
        return Ok(RestorePlan::Replace);
    }

    Ok(RestorePlan::Skip)
}

/// Close a half-opened connection and remove a database file that this open
/// created, then hand back the error.
fn abandon(conn: Connection, path: &Path, existed: bool, err: Error) -> Error {
    drop(conn);
    if !existed {
        if let Err(cleanup) = remove_database(path) {
            warn!(error = %cleanup, "Failed to remove partially created database");
        }
    }
    err
}
