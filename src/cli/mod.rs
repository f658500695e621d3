//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// jsqlon - keep an SQLite database in step with a JSON snapshot
#[derive(Parser, Debug)]
#[command(name = "jsqlon", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: data/data.db)
    #[arg(long, global = true, env = "JSQLON_DB")]
    pub db: Option<PathBuf>,

    /// Snapshot path (default: database path with a .json extension)
    #[arg(long, global = true, env = "JSQLON_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring database and snapshot in step: restore from a newer
    /// snapshot, dump a newer database
    Sync,

    /// Write the snapshot from the database
    Dump,

    /// Rebuild the database from the snapshot
    Restore {
        /// Back up and replace an existing database
        #[arg(long)]
        force: bool,

        /// Print the SQL a restore would run without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a statement inside a session and print the rows
    Query(QueryArgs),

    /// Show whether the database and snapshot are in sync
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL statement to run
    pub sql: String,

    /// Positional parameter bound to ?1, ?2, ... (repeatable)
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Print rows as arrays instead of name-keyed objects
    #[arg(long)]
    pub positional: bool,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_params_repeat() {
        let cli = Cli::parse_from(["jsqlon", "query", "SELECT ?1, ?2", "-p", "a", "--param", "b"]);
        let Commands::Query(args) = cli.command else {
            panic!("expected query command");
        };
        assert_eq!(args.params, ["a", "b"]);
        assert!(!args.positional);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["jsqlon", "sync", "--db", "x.db", "--json", "-vv"]);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Sync));
    }
}
