//! ScanPulse CLI entry point

use anyhow::{Context, Result};
use scanpulse::config::cli::{Cli, ExecutionMode};
use scanpulse::config::{Config, LaunchMode, Strategy};
use scanpulse::distributed::{run_peer_blocking, ScanPeer};
use scanpulse::util::TripleBuffer;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli);
    cli.validate()?;

    match cli.mode {
        ExecutionMode::Scan => run_scan(&cli),
        ExecutionMode::Worker => run_worker(&cli),
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides the `-v` level.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scanpulse={}", cli.log_level())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Scan an input with the configured strategy and report the count
fn run_scan(cli: &Cli) -> Result<()> {
    let config = scanpulse::config::toml::load_config(cli)?;
    scanpulse::config::validator::validate_config(&config)
        .context("Configuration validation failed")?;

    if !config.output.quiet {
        println!("ScanPulse v{}", env!("CARGO_PKG_VERSION"));
        println!();
        print_configuration(&config);
    }

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let buffer = load_input(cli)?;
    let report = scanpulse::coordinator::run_strategy(&config, &buffer)
        .with_context(|| format!("Scan failed using the {} strategy", config.scan.strategy))?;

    if !config.output.quiet {
        println!();
    }
    scanpulse::output::text::print_report(&report, config.scan.threshold, config.output.quiet);

    if let Some(ref path) = config.output.json_output {
        let json = scanpulse::output::json::build_report(&report, &config);
        scanpulse::output::json::write_json_output(path, &json, true)?;
        if !config.output.quiet {
            println!("JSON report written to: {}", path.display());
        }
    }

    Ok(())
}

/// Serve one slice for a network coordinator
fn run_worker(cli: &Cli) -> Result<()> {
    let config = scanpulse::config::toml::load_config(cli)?;
    let coordinator = cli
        .connect
        .as_deref()
        .context("worker mode requires --connect HOST:PORT")?;

    let peer = ScanPeer::new(coordinator, config.scan.threshold)
        .with_retry(config.network.connect_retry(), config.network.connect_attempts);

    run_peer_blocking(&peer)?;
    Ok(())
}

fn load_input(cli: &Cli) -> Result<TripleBuffer> {
    if let Some(triples) = cli.synthetic_triples {
        return scanpulse::source::synthetic(triples, cli.seed)
            .context("Failed to generate synthetic input");
    }

    let path = cli.input.as_deref().context("No input file given")?;
    scanpulse::source::load_bitmap(path).context("Failed to load input")
}

fn print_configuration(config: &Config) {
    let scan = &config.scan;

    println!("Configuration:");
    println!("  Strategy:    {}", scan.strategy);
    if scan.strategy == Strategy::Reduction {
        println!("  Threads:     {}", scan.workers);
    } else {
        println!("  Workers:     {}", scan.workers);
        println!("  Aggregation: {:?}", scan.aggregation);
    }
    println!("  Threshold:   {}", scan.threshold);

    if scan.strategy == Strategy::Network {
        let network = &config.network;
        println!("  Endpoint:    {}", network.endpoint());
        match network.launch {
            LaunchMode::Spawn => println!("  Peers:       launched locally"),
            LaunchMode::External => println!("  Peers:       external ({} expected)", scan.workers),
        }
    }
}
