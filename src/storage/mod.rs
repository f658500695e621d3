//! SQLite storage layer for jsqlon.
//!
//! This module owns the live database side of a snapshot pair:
//! - Sessions that restore on open and dump on close
//! - Row factories that shape query results
//! - Catalog helpers for enumerating user tables and columns
//!
//! # Submodules
//!
//! - [`session`] - Session lifecycle and query execution
//! - [`factory`] - Built-in row factories
//! - [`schema`] - Catalog inspection

pub mod factory;
pub mod schema;
pub mod session;

pub use factory::{Columns, Record};
pub use session::{DumpPolicy, RestorePolicy, Session, SessionOptions};
