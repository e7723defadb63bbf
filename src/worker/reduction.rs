//! Parallel reduction
//!
//! Counts over the whole buffer with a rayon pool of a fixed size instead of
//! explicit slices. No per-worker partials exist in this mode; the pool's
//! reduction produces the total directly.

use crate::error::{Result, ScanError};
use crate::util::{TripleBuffer, TRIPLE_LEN};
use rayon::prelude::*;

/// Minimum triples handed to one rayon task
const MIN_TRIPLES_PER_TASK: usize = 4096;

/// Count matching triples using `threads` rayon workers.
pub fn count_parallel(buffer: &TripleBuffer, threads: usize, threshold: u32) -> Result<u64> {
    if threads == 0 {
        return Err(ScanError::InvalidArgument(
            "thread count must be at least 1".to_string(),
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("scan-reduce-{}", i))
        .build()
        .map_err(|e| {
            ScanError::spawn(
                "failed to build reduction pool",
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?;

    let total = pool.install(|| {
        buffer
            .as_bytes()
            .par_chunks_exact(TRIPLE_LEN)
            .with_min_len(MIN_TRIPLES_PER_TASK)
            .filter(|t| u32::from(t[0]) * u32::from(t[1]) * u32::from(t[2]) < threshold)
            .count() as u64
    });

    Ok(total)
}
