//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Every field has a default, so an empty TOML file is a valid configuration.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::worker::DEFAULT_THRESHOLD;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Execution strategy for the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One OS thread per slice
    Threads,
    /// One forked process per slice
    Processes,
    /// One network peer per slice
    Network,
    /// Rayon parallel reduction over the whole buffer
    Reduction,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Threads => "threads",
            Self::Processes => "processes",
            Self::Network => "network",
            Self::Reduction => "reduction",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Threads
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How partial results are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    /// Write-once slot per worker, summed at the end
    Slots,
    /// Shared accumulator behind a mutex
    Locked,
}

impl Default for AggregationKind {
    fn default() -> Self {
        Self::Slots
    }
}

/// Who starts network peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Peers are started independently and connect on their own
    External,
    /// The coordinator launches one copy of its own executable per slice
    Spawn,
}

impl Default for LaunchMode {
    fn default() -> Self {
        Self::Spawn
    }
}

/// Scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub strategy: Strategy,
    /// Number of workers (slices)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Triples with `r * g * b` below this value are counted
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub aggregation: AggregationKind,
}

fn default_workers() -> usize {
    5
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            workers: default_workers(),
            threshold: default_threshold(),
            aggregation: AggregationKind::default(),
        }
    }
}

/// Network strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the coordinator listens on and peers connect to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port of the listening endpoint (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub launch: LaunchMode,
    /// Accept timeout per peer in milliseconds (0 disables)
    #[serde(default = "default_timeout_ms")]
    pub accept_timeout_ms: u64,
    /// Timeout for payload writes and reply reads in milliseconds (0 disables)
    #[serde(default = "default_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Delay between peer connect attempts in milliseconds, forwarded to spawned peers
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,
    /// Connect attempts a peer makes before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connect_retry_ms() -> u64 {
    50
}

fn default_connect_attempts() -> u32 {
    200
}

fn optional_millis(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

impl NetworkConfig {
    /// `host:port` the listener binds to
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        optional_millis(self.accept_timeout_ms)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        optional_millis(self.io_timeout_ms)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            launch: LaunchMode::default(),
            accept_timeout_ms: default_timeout_ms(),
            io_timeout_ms: default_timeout_ms(),
            connect_retry_ms: default_connect_retry_ms(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON report to this path
    pub json_output: Option<PathBuf>,
    /// Print only the total
    #[serde(default)]
    pub quiet: bool,
}
