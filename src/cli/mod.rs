//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, RunCommand, StepsCommand, ValidateCommand};
use std::ffi::OsString;

/// Typed data pipelines built from registered steps
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeco")]
#[command(version)]
#[command(about = "Run typed, schema-checked data pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline definition
    Run(RunCommand),

    /// Validate a pipeline definition without running it
    Validate(ValidateCommand),

    /// List registered steps and their schemas
    Steps(StepsCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "pipeco",
            "run",
            "--file",
            "clean.yaml",
            "--set",
            "csv_path=people.csv",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.file, "clean.yaml");
                assert_eq!(cmd.input, "{}");
                assert_eq!(cmd.set, vec![("csv_path".to_string(), "people.csv".to_string())]);
                assert!(!cmd.no_history);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_history_defaults() {
        let cli = Cli::try_parse_from(["pipeco", "history"]).unwrap();
        match cli.command {
            Command::History(cmd) => {
                assert_eq!(cmd.limit, 10);
                assert!(cmd.pipeline.is_none());
            }
            other => panic!("expected history, got {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_a_file() {
        assert!(Cli::try_parse_from(["pipeco", "run"]).is_err());
    }
}
