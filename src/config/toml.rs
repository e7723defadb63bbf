//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with a configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(strategy) = cli.strategy {
        config.scan.strategy = strategy;
    }
    if cli.auto_workers {
        config.scan.workers = num_cpus::get();
    } else if let Some(workers) = cli.workers {
        config.scan.workers = workers;
    }
    if let Some(threshold) = cli.threshold {
        config.scan.threshold = threshold;
    }
    if let Some(aggregation) = cli.aggregation {
        config.scan.aggregation = aggregation;
    }

    if let Some(ref bind) = cli.bind {
        config.network.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(launch) = cli.launch {
        config.network.launch = launch;
    }
    if let Some(ms) = cli.accept_timeout_ms {
        config.network.accept_timeout_ms = ms;
    }
    if let Some(ms) = cli.io_timeout_ms {
        config.network.io_timeout_ms = ms;
    }
    if let Some(ms) = cli.connect_retry_ms {
        config.network.connect_retry_ms = ms;
    }
    if let Some(attempts) = cli.connect_attempts {
        config.network.connect_attempts = attempts;
    }

    if cli.json_output.is_some() {
        config.output.json_output = cli.json_output.clone();
    }
    if cli.quiet {
        config.output.quiet = true;
    }

    config
}

/// Load the configuration file named on the command line (if any) and apply
/// CLI overrides on top of it.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    Ok(merge_cli_with_config(cli, base))
}
