//! Run statistics
//!
//! Partial results reported by workers and the per-run report assembled by the
//! coordinator once every partial has been aggregated.

pub mod aggregator;

pub use aggregator::{Aggregator, LockedAggregator, SlotAggregator};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Count produced by one worker over its slice
///
/// The worker index only orders diagnostics; it plays no part in the sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    pub worker: usize,
    pub count: u64,
}

impl PartialResult {
    pub fn new(worker: usize, count: u64) -> Self {
        Self { worker, count }
    }
}

/// Outcome of one coordination run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Strategy that produced the result (`threads`, `processes`, ...)
    pub strategy: &'static str,
    pub worker_count: usize,
    pub buffer_len: usize,
    pub total: u64,
    /// Per-worker partials in worker order; empty for the reduction strategy
    pub partials: Vec<PartialResult>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn triple_count(&self) -> usize {
        self.buffer_len / crate::util::TRIPLE_LEN
    }
}
