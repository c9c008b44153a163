//! Command-line definitions for the `docdrop` binary
//!
//! Kept in the library so the reference docs can be generated from the same
//! definitions (`cargo xtask generate-cli-docs`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Docdrop - exactly-once document ingestion with bounded retry
#[derive(Parser, Debug)]
#[command(name = "docdrop")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Ledger database path (overrides DOCDROP_LEDGER_PATH)
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Number of concurrent workers (overrides DOCDROP_MAX_WORKERS)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit files and wait until every one has finished
    Submit {
        /// Files to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Submit every file in a directory
    Scan {
        /// Directory to scan
        dir: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Inspect the processed ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },
}

/// Ledger subcommands
#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Show the most recently processed documents
    List {
        /// Maximum number of records
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report whether a file's content has already been processed
    Check {
        /// File to fingerprint
        path: PathBuf,
    },

    /// Number of processed documents
    Count,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docdrop", "scan", "/inbox", "--recursive", "--workers", "8", "--ledger", "/tmp/l.db",
        ])
        .unwrap();

        assert_eq!(cli.workers, Some(8));
        assert_eq!(cli.ledger, Some(PathBuf::from("/tmp/l.db")));
        assert!(matches!(cli.command, Commands::Scan { recursive: true, .. }));
    }

    #[test]
    fn test_submit_requires_a_path() {
        assert!(Cli::try_parse_from(["docdrop", "submit"]).is_err());
    }

    #[test]
    fn test_ledger_list_defaults() {
        let cli = Cli::try_parse_from(["docdrop", "ledger", "list"]).unwrap();
        match cli.command {
            Commands::Ledger {
                action: LedgerCommand::List { limit, json },
            } => {
                assert_eq!(limit, 20);
                assert!(!json);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
