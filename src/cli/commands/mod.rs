//! Command implementations.

pub mod completions;
pub mod dump;
pub mod query;
pub mod restore;
pub mod status;
pub mod sync;
pub mod version;

use crate::storage::SessionOptions;
use std::path::PathBuf;

/// Session options carrying the `--snapshot` override, if any.
fn session_options(snapshot_path: Option<&PathBuf>) -> SessionOptions {
    let options = SessionOptions::default();
    match snapshot_path {
        Some(path) => options.snapshot_path(path),
        None => options,
    }
}
