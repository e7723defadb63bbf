//! CLI argument parsing using clap

use super::{AggregationKind, LaunchMode, Strategy};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Scan an input and print the count (default)
    Scan,
    /// Run one network peer: connect, receive a slice, reply with its count
    Worker,
}

/// ScanPulse - parallel pixel-triple scanner
#[derive(Parser, Debug)]
#[command(name = "scanpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: scan or worker
    #[arg(long, value_enum, default_value = "scan")]
    pub mode: ExecutionMode,

    /// Bitmap to scan
    ///
    /// Not used in worker mode (the coordinator sends the slice)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// TOML configuration file (CLI flags take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Scan Options ===
    /// Execution strategy
    #[arg(short = 's', long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Number of workers (slices)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Use one worker per available CPU
    #[arg(long, conflicts_with = "workers")]
    pub auto_workers: bool,

    /// Count triples whose component product is below this value
    #[arg(short = 't', long)]
    pub threshold: Option<u32>,

    /// How partial results are combined
    #[arg(long, value_enum)]
    pub aggregation: Option<AggregationKind>,

    /// Scan N random triples instead of an input file
    #[arg(long, conflicts_with = "input")]
    pub synthetic_triples: Option<usize>,

    /// Seed for synthetic input
    #[arg(long, default_value = "0")]
    pub seed: u64,

    // === Network Options ===
    /// Address the coordinator listens on
    #[arg(long)]
    pub bind: Option<String>,

    /// Port the coordinator listens on
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Whether the coordinator launches network peers itself
    #[arg(long, value_enum)]
    pub launch: Option<LaunchMode>,

    /// Accept timeout per peer in milliseconds (0 disables)
    #[arg(long)]
    pub accept_timeout_ms: Option<u64>,

    /// Socket IO timeout in milliseconds (0 disables)
    #[arg(long)]
    pub io_timeout_ms: Option<u64>,

    /// Delay between connect attempts in milliseconds (worker mode)
    #[arg(long)]
    pub connect_retry_ms: Option<u64>,

    /// Connect attempts before a worker gives up
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Coordinator address to connect to (worker mode only)
    #[arg(long, value_name = "HOST:PORT")]
    pub connect: Option<String>,

    // === Output Options ===
    /// Write a JSON report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Print only the total
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Validate configuration and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.mode {
            ExecutionMode::Worker => {
                if self.connect.is_none() {
                    anyhow::bail!("worker mode requires --connect HOST:PORT");
                }
            }
            ExecutionMode::Scan => {
                if self.connect.is_some() {
                    anyhow::bail!("--connect is only valid in worker mode");
                }
                if self.input.is_none() && self.synthetic_triples.is_none() && !self.dry_run {
                    anyhow::bail!("an INPUT file or --synthetic-triples is required");
                }
            }
        }

        if self.connect_attempts == Some(0) {
            anyhow::bail!("connect attempts must be at least 1");
        }

        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        Ok(())
    }

    /// Default log level implied by `-v` flags
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
