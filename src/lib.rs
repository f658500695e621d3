//! jsqlon - SQLite databases kept in step with a JSON snapshot
//!
//! This crate provides the core functionality for the `jsqlon` CLI tool.
//! A [`Session`] opens a database, restores it from its snapshot when the
//! database is missing, runs queries, and dumps the database back to the
//! snapshot when it closes.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`storage`] - Sessions, row factories and catalog helpers
//! - [`snapshot`] - Snapshot format, dump, restore and status
//! - [`config`] - Path resolution
//! - [`error`] - Error types and handling
//!
//! # Example
//!
//! ```no_run
//! use jsqlon::Session;
//!
//! # fn main() -> jsqlon::Result<()> {
//! let mut session = Session::open("data/data.db")?;
//! session.execute_batch("CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT)")?;
//! session.execute("INSERT INTO notes (body) VALUES (?1)", ["hello"])?;
//! let rows = session.query("SELECT * FROM notes", [])?;
//! println!("{} notes", rows.len());
//! session.close()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod storage;

pub use error::{Error, Result};
pub use snapshot::{DumpOutcome, Snapshot, SnapshotStats};
pub use storage::{Columns, DumpPolicy, Record, RestorePolicy, Session, SessionOptions, factory};
