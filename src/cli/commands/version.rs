//! Version command implementation.
//!
//! Reports the snapshot format and the linked SQLite library next to the
//! crate version.

use crate::error::Result;
use crate::snapshot::FORMAT_VERSION;

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let sqlite = rusqlite::version();

    if json {
        let output = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "snapshot_format": FORMAT_VERSION,
            "sqlite": sqlite,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!(
        "jsqlon {} (snapshot format {FORMAT_VERSION}, SQLite {sqlite})",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}
