//! JSON output formatting
//!
//! Serializes a run report for machine consumption. Durations carry both a
//! raw value and a human-readable form.

use crate::config::Config;
use crate::stats::{PartialResult, RunReport};
use crate::util::time::{format_elapsed, format_rate, scan_rate};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_elapsed(d),
        }
    }
}

/// Scan settings that produced the result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonScanSettings {
    pub strategy: String,
    pub workers: usize,
    pub threshold: u32,
    pub aggregation: String,
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub settings: JsonScanSettings,
    pub buffer_bytes: usize,
    pub triples: usize,
    pub total: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub partials: Vec<PartialResult>,
    pub elapsed: JsonDuration,
    pub throughput_bytes_per_sec: u64,
    pub throughput_human: String,
}

/// Build the JSON report for a finished run.
pub fn build_report(report: &RunReport, config: &Config) -> JsonReport {
    let throughput = scan_rate(report.buffer_len, report.elapsed);

    JsonReport {
        generated_at: Utc::now(),
        settings: JsonScanSettings {
            strategy: report.strategy.to_string(),
            workers: report.worker_count,
            threshold: config.scan.threshold,
            aggregation: format!("{:?}", config.scan.aggregation).to_lowercase(),
        },
        buffer_bytes: report.buffer_len,
        triples: report.triple_count(),
        total: report.total,
        partials: report.partials.clone(),
        elapsed: JsonDuration::from_duration(report.elapsed),
        throughput_bytes_per_sec: throughput as u64,
        throughput_human: format_rate(throughput),
    }
}

/// Write JSON report to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, report)?;
    } else {
        serde_json::to_writer(file, report)?;
    }

    Ok(())
}
