//! Command-line interface for envsync

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "envsync")]
#[command(about = "Compare and migrate rows between JSON environment datasets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this configuration file instead of envsync.toml / global config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the tables of a dataset with their row counts
    Tables {
        /// Dataset identity
        dataset: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show dataset content
    Show {
        /// Dataset identity
        dataset: String,

        /// Only show this table
        #[arg(long)]
        table: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a source dataset against a target dataset
    Diff {
        /// Source dataset identity
        source: String,

        /// Target dataset identity
        target: String,

        /// Which rows to show
        #[arg(long, value_enum, default_value = "all")]
        filter: DiffFilter,

        /// Only show tables whose name contains this text (case-insensitive)
        #[arg(long)]
        search: Option<String>,

        /// Page of rows to show within each table (starting at 1)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy selected tables, rows or cells from source into target
    Migrate {
        /// Source dataset identity
        source: String,

        /// Target dataset identity
        target: String,

        /// JSON selection file ({"selectedTables": [...], "selectedRows": [...], "selectedCells": [...]})
        #[arg(long, conflicts_with_all = ["table", "row", "cells"])]
        selection: Option<PathBuf>,

        /// Copy (or delete) a whole table
        #[arg(long)]
        table: Vec<String>,

        /// Copy (or delete) a row, as TABLE/KEY
        #[arg(long)]
        row: Vec<String>,

        /// Copy cells of a row, as TABLE/KEY=col1,col2
        #[arg(long)]
        cells: Vec<String>,

        /// Show what would change without backing up or saving
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompts
        #[arg(long)]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List backups, optionally for one dataset
    Backups {
        /// Dataset identity
        dataset: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect envsync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffFilter {
    All,
    Diff,
    Missing,
    DiffMissing,
    Same,
}

impl From<DiffFilter> for envsync_core::ViewFilter {
    fn from(filter: DiffFilter) -> Self {
        match filter {
            DiffFilter::All => envsync_core::ViewFilter::All,
            DiffFilter::Diff => envsync_core::ViewFilter::Diff,
            DiffFilter::Missing => envsync_core::ViewFilter::Missing,
            DiffFilter::DiffMissing => envsync_core::ViewFilter::DiffMissing,
            DiffFilter::Same => envsync_core::ViewFilter::Same,
        }
    }
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
    fn test_parse_migrate_flags() {
        let cli = Cli::parse_from([
            "envsync",
            "migrate",
            "dev",
            "prod",
            "--table",
            "Regions",
            "--row",
            "Users/u1",
            "--cells",
            "Users/u2=name,age",
            "--force",
        ]);
        match cli.command {
            Commands::Migrate {
                table, row, cells, force, dry_run, ..
            } => {
                assert_eq!(table, vec!["Regions"]);
                assert_eq!(row, vec!["Users/u1"]);
                assert_eq!(cells, vec!["Users/u2=name,age"]);
                assert!(force);
                assert!(!dry_run);
            }
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_parse_diff_filter() {
        let cli = Cli::parse_from(["envsync", "-v", "diff", "dev", "prod", "--filter", "diff-missing"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Diff { filter, page, .. } => {
                assert_eq!(filter, DiffFilter::DiffMissing);
                assert_eq!(page, 1);
            }
            _ => panic!("expected diff"),
        }
    }
}
