//! Scan worker
//!
//! The scan worker is the unit of parallel work: it walks one slice of a
//! [`TripleBuffer`] and counts the triples whose component product falls below
//! the configured threshold. Every execution strategy (threads, forked
//! processes, network peers) ends up calling [`count_below`] on its slice.
//!
//! # Example
//!
//! ```
//! use scanpulse::worker::ScanWorker;
//!
//! let worker = ScanWorker::new(0, 1000);
//! // 1*2*3 = 6 counts, 10*10*10 = 1000 does not
//! let count = worker.scan(&[1, 2, 3, 10, 10, 10]).unwrap();
//! assert_eq!(count, 1);
//! ```

pub mod reduction;

use crate::error::{Result, ScanError};
use crate::partition::Slice;
use crate::stats::PartialResult;
use crate::util::{TripleBuffer, TRIPLE_LEN};

/// Product threshold used when none is configured
pub const DEFAULT_THRESHOLD: u32 = 1000;

/// Count triples in `bytes` whose product is below `threshold`.
///
/// Trailing bytes that do not form a whole triple are ignored; callers
/// validate alignment beforehand. This function does not allocate, which keeps
/// it usable from a freshly forked child.
#[inline]
pub fn count_below(bytes: &[u8], threshold: u32) -> u64 {
    bytes
        .chunks_exact(TRIPLE_LEN)
        .filter(|t| u32::from(t[0]) * u32::from(t[1]) * u32::from(t[2]) < threshold)
        .count() as u64
}

/// Worker that scans one slice and reports a partial count
#[derive(Debug, Clone, Copy)]
pub struct ScanWorker {
    id: usize,
    threshold: u32,
}

impl ScanWorker {
    pub fn new(id: usize, threshold: u32) -> Self {
        Self { id, threshold }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Scan a raw view that must consist of whole triples.
    pub fn scan(&self, view: &[u8]) -> Result<u64> {
        if view.len() % TRIPLE_LEN != 0 {
            return Err(ScanError::InvalidArgument(format!(
                "worker {} received {} bytes, not a whole number of triples",
                self.id,
                view.len()
            )));
        }

        let local_count = count_below(view, self.threshold);
        tracing::debug!(worker = self.id, local_count, bytes = view.len(), "slice scanned");
        Ok(local_count)
    }

    /// Scan `slice` of `buffer` and wrap the count as a partial result.
    pub fn scan_slice(&self, buffer: &TripleBuffer, slice: &Slice) -> Result<PartialResult> {
        let view = buffer.view(slice)?;
        let count = self.scan(view)?;
        Ok(PartialResult::new(self.id, count))
    }
}
