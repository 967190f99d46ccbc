//! Config command implementation.

use crate::core::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands. The file comes from the global `--config` flag.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configuration file.
    Validate,
    /// Print configuration with defaults.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/quorum-request.toml";

/// Run the config command.
pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => {
            validate_config(config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH)))
        }
        ConfigCommand::Show { format } => {
            let rendered = show_config(config_path, &format)?;
            println!("{}", rendered);
            Ok(())
        }
    }
}

fn validate_config(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }
    let config = Config::from_file(path)?;
    println!("✓ Config file is valid");
    println!(
        "  stale checks: connection={} latency={}",
        config.request.stale_connection_check, config.request.stale_latency_check
    );
    match config.request.large_request_threshold {
        Some(threshold) => println!(
            "  large requests: threshold={} max_bytes={}",
            threshold, config.request.large_request_max_bytes
        ),
        None => println!("  large requests: tracking disabled"),
    }
    Ok(())
}

fn show_config(path: Option<&Path>, format: &str) -> Result<String> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    match format {
        "toml" => Ok(toml::to_string_pretty(&config)?),
        "json" => Ok(serde_json::to_string_pretty(&config)?),
        other => anyhow::bail!("Unknown format: {}. Use 'toml' or 'json'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn show_renders_defaults() {
        let toml = show_config(None, "toml").unwrap();
        assert!(toml.contains("stale_connection_check = true"));
        let json = show_config(None, "json").unwrap();
        assert!(json.contains("\"queue_capacity\": 1024"));
        assert!(show_config(None, "yaml").is_err());
    }

    #[test]
    fn validate_rejects_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nqueue_capacity = 0").unwrap();
        assert!(validate_config(file.path()).is_err());
        assert!(validate_config(Path::new("/nonexistent/quorum.toml")).is_err());
    }
}
