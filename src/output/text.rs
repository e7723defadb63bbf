//! Human-readable text output

use crate::stats::RunReport;
use crate::util::time::{format_count, format_elapsed, format_rate, scan_rate};

/// Render the run report as the console summary.
///
/// Shows the strategy, input size, per-worker partials (when the strategy has
/// them), the total and scan throughput.
pub fn render_report(report: &RunReport, threshold: u32) -> String {
    let mut out = String::new();
    let rule = "═══════════════════════════════════════════════════════════";

    out.push_str(rule);
    out.push('\n');
    out.push_str("                    SCAN RESULTS\n");
    out.push_str(rule);
    out.push_str("\n\n");

    out.push_str(&format!("Strategy:  {} ({} workers)\n", report.strategy, report.worker_count));
    out.push_str(&format!(
        "Input:     {} triples ({} bytes)\n",
        format_count(report.triple_count() as u64),
        format_count(report.buffer_len as u64)
    ));
    out.push_str(&format!("Threshold: r*g*b < {}\n", threshold));
    out.push('\n');

    if !report.partials.is_empty() {
        out.push_str("Partials:\n");
        for partial in &report.partials {
            out.push_str(&format!(
                "  Worker {:>3}: {}\n",
                partial.worker,
                format_count(partial.count)
            ));
        }
        out.push('\n');
    }

    let throughput = scan_rate(report.buffer_len, report.elapsed);
    out.push_str(&format!("Total:     {}\n", format_count(report.total)));
    out.push_str(&format!(
        "Elapsed:   {} ({})\n",
        format_elapsed(report.elapsed),
        format_rate(throughput)
    ));
    out.push_str(rule);
    out.push('\n');

    out
}

/// Print the run report to stdout.
///
/// In quiet mode only the total is printed.
pub fn print_report(report: &RunReport, threshold: u32, quiet: bool) {
    if quiet {
        println!("{}", report.total);
    } else {
        print!("{}", render_report(report, threshold));
    }
}
