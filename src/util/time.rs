//! Timing and formatting helpers for run reports
//!
//! A report states how long the scan took and how fast it went through the
//! buffer. Both are printed with two decimals in the largest unit that keeps
//! the value at or above one.

use std::time::Duration;

/// Nanoseconds per unit, largest first
const ELAPSED_UNITS: [(f64, &str); 3] = [(1e9, "s"), (1e6, "ms"), (1e3, "us")];

/// Bytes per unit, largest first
const RATE_UNITS: [(f64, &str); 3] = [
    (1024.0 * 1024.0 * 1024.0, "GB/s"),
    (1024.0 * 1024.0, "MB/s"),
    (1024.0, "KB/s"),
];

/// Render the wall-clock time of a scan.
///
/// ```
/// use std::time::Duration;
/// use scanpulse::util::time::format_elapsed;
///
/// // A 17-triple scan finishes in nanoseconds, a large bitmap in milliseconds
/// assert_eq!(format_elapsed(Duration::from_nanos(40)), "40ns");
/// assert_eq!(format_elapsed(Duration::from_millis(250)), "250.00ms");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let nanos = elapsed.as_nanos() as f64;
    ELAPSED_UNITS
        .iter()
        .find(|(scale, _)| nanos >= *scale)
        .map(|(scale, unit)| format!("{:.2}{}", nanos / scale, unit))
        .unwrap_or_else(|| format!("{}ns", elapsed.as_nanos()))
}

/// Buffer bytes scanned per second; 0 when no time elapsed.
pub fn scan_rate(buffer_len: usize, elapsed: Duration) -> f64 {
    match elapsed.as_secs_f64() {
        secs if secs > 0.0 => buffer_len as f64 / secs,
        _ => 0.0,
    }
}

/// Render a scan rate from [`scan_rate`].
pub fn format_rate(bytes_per_sec: f64) -> String {
    RATE_UNITS
        .iter()
        .find(|(scale, _)| bytes_per_sec >= *scale)
        .map(|(scale, unit)| format!("{:.2} {}", bytes_per_sec / scale, unit))
        .unwrap_or_else(|| format!("{:.2} B/s", bytes_per_sec))
}

/// Group digits in thousands: `1234567` becomes `1,234,567`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    grouped
}
