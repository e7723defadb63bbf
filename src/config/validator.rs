//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_scan(&config.scan)?;
    if config.scan.strategy == Strategy::Network {
        validate_network(&config.network)?;
    }
    validate_output(&config.output)?;

    Ok(())
}

/// Validate scan configuration
pub fn validate_scan(scan: &ScanConfig) -> Result<()> {
    if scan.workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }

    if scan.strategy == Strategy::Processes && !cfg!(unix) {
        anyhow::bail!("the processes strategy requires a Unix platform");
    }

    if scan.strategy == Strategy::Reduction && scan.aggregation == AggregationKind::Locked {
        tracing::warn!("aggregation setting is ignored by the reduction strategy");
    }

    if scan.threshold == 0 {
        tracing::warn!("threshold is 0, no triple can match");
    }

    Ok(())
}

/// Validate network configuration
pub fn validate_network(network: &NetworkConfig) -> Result<()> {
    if network.bind.trim().is_empty() {
        anyhow::bail!("network bind address cannot be empty");
    }

    if network.launch == LaunchMode::External && network.port == 0 {
        anyhow::bail!("an explicit port is required when peers are launched externally");
    }

    if network.connect_attempts == 0 {
        anyhow::bail!("connect_attempts must be at least 1");
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(ref path) = output.json_output {
        if path.is_dir() {
            anyhow::bail!("json_output must be a file path, got directory {}", path.display());
        }
    }

    Ok(())
}
