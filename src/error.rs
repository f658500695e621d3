//! Error types for jsqlon.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=query, 4=usage, 6=restore, 7=config, 8=io)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for jsqlon operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Query (exit 3)
    QueryError,

    // Usage (exit 4)
    InvalidArgument,

    // Restore (exit 6)
    RestoreError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::QueryError => "QUERY_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::RestoreError => "RESTORE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::DatabaseError => 2,
            Self::QueryError => 3,
            Self::InvalidArgument => 4,
            Self::RestoreError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while syncing a database with its snapshot.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot restore from {}: {reason}", path.display())]
    Restore { path: PathBuf, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Query failed: {source} (in `{sql}`)")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Build a closure that wraps an `io::Error` with the path it happened on.
    ///
    /// Meant for `map_err`: `fs::read(&path).map_err(Error::io(&path))`.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Build a closure that wraps an engine error raised by `sql`.
    pub fn query(sql: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| Self::Query {
            sql: sql.to_string(),
            source,
        }
    }

    /// Build a restore error for the given snapshot path.
    pub fn restore(path: &Path, reason: impl Into<String>) -> Self {
        Self::Restore {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::IoError,
            Self::Restore { .. } => ErrorCode::RestoreError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Query { .. } => ErrorCode::QueryError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Restore { path, .. } => Some(format!(
                "Fix or remove {} and run `jsqlon sync` again. \
                 `jsqlon restore --dry-run` shows the statements a restore would run.",
                path.display()
            )),

            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => {
                Some("Check the file permissions of the database directory.".to_string())
            }

            Self::Config(msg) if msg.contains("snapshot path") => Some(
                "Pass a different --snapshot path, or give the database a non-.json extension."
                    .to_string(),
            ),

            Self::Io { .. }
            | Self::Database(_)
            | Self::Query { .. }
            | Self::Json(_)
            | Self::Config(_)
            | Self::InvalidArgument(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
