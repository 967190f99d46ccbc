//! Command-line interface.
//!
//! Operator tooling for inspecting request classification, rendering
//! request diagnostics and reading transaction logs.

pub mod commands;

use crate::ops::telemetry::LOG_LEVELS;
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};

/// Request envelope and transaction log tooling.
#[derive(Parser, Debug)]
#[command(name = "quorum-request")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, value_parser = PossibleValuesParser::new(LOG_LEVELS))]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how an operation code is classified.
    Classify(commands::ClassifyArgs),
    /// Build a request from flags and print its diagnostic line.
    Describe(commands::DescribeArgs),
    /// Inspect transaction logs.
    Inspect(commands::InspectArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_must_be_known() {
        let cli = Cli::try_parse_from(["quorum-request", "--log-level", "debug", "classify"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));

        assert!(Cli::try_parse_from(["quorum-request", "--log-level", "verbose", "classify"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["quorum-request", "config", "validate", "--config", "q.toml"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("q.toml"));
        assert!(matches!(cli.command, Commands::Config(_)));
    }
}
