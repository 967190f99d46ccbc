//! Quorum Request - operator CLI entrypoint.
//!
//! Usage:
//!   quorum-request classify getData
//!   quorum-request describe --op create --path /app/lock --session-id 0x10
//!   quorum-request inspect txnlog <log-file>...
//!   quorum-request --config config/quorum-request.toml config validate

use anyhow::Result;
use clap::Parser;
use quorum_request::cli::commands::{run_classify, run_config, run_describe, run_inspect};
use quorum_request::cli::{Cli, Commands};
use quorum_request::config::{Config, ConfigOverrides};
use quorum_request::telemetry::init_tracing;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref().map(PathBuf::from);

    // `config validate` reports problems with the file itself.
    let mut config = match (&cli.command, &config_path) {
        (Commands::Config(_), _) | (_, None) => Config::default(),
        (_, Some(path)) => Config::from_file(path)?,
    };
    config.apply_overrides(&ConfigOverrides {
        log_level: cli.log_level.clone(),
        ..Default::default()
    });
    config.validate()?;
    init_tracing(&config.telemetry.log_level);

    match cli.command {
        Commands::Classify(args) => run_classify(args),
        Commands::Describe(args) => run_describe(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Config(args) => run_config(args, config_path.as_deref()),
    }
}
