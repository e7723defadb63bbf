//! Work partitioning
//!
//! Splits a triple buffer into one contiguous slice per worker. Slices are laid
//! out from the end of the buffer toward the start: slice 0 holds the tail and
//! the highest-index slice holds the head. When the triple count does not divide
//! evenly, the trailing `remainder` slices in index order each take one extra
//! triple, so slice sizes never differ by more than one triple.
//!
//! # Example
//!
//! ```
//! use scanpulse::partition::partition;
//!
//! // 17 triples over 5 workers: three slices of 3 triples, two of 4
//! let slices = partition(51, 5).unwrap();
//! let sizes: Vec<usize> = slices.iter().map(|s| s.triple_count()).collect();
//! assert_eq!(sizes, vec![3, 3, 3, 4, 4]);
//! assert_eq!(slices[0].end, 51);
//! assert_eq!(slices[4].start, 0);
//! ```

use crate::error::{Result, ScanError};
use crate::util::TRIPLE_LEN;

/// Half-open, triple-aligned byte range `[start, end)` assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    /// Worker index this slice belongs to
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Slice {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn triple_count(&self) -> usize {
        self.len() / TRIPLE_LEN
    }
}

/// Compute `worker_count` slices covering `[0, buffer_len)`.
///
/// Fails with `InvalidArgument` if `worker_count == 0` or `buffer_len` is not a
/// multiple of 3. More workers than triples is allowed; the surplus slices are
/// empty.
pub fn partition(buffer_len: usize, worker_count: usize) -> Result<Vec<Slice>> {
    if worker_count == 0 {
        return Err(ScanError::InvalidArgument(
            "worker count must be at least 1".to_string(),
        ));
    }
    if buffer_len % TRIPLE_LEN != 0 {
        return Err(ScanError::InvalidArgument(format!(
            "buffer length {} is not a multiple of {}",
            buffer_len, TRIPLE_LEN
        )));
    }

    let triples = buffer_len / TRIPLE_LEN;
    let base = triples / worker_count;
    let remainder = triples % worker_count;
    let first_extended = worker_count - remainder;

    let mut slices = Vec::with_capacity(worker_count);
    let mut end = buffer_len;
    for index in 0..worker_count {
        let size = if index >= first_extended { base + 1 } else { base };
        let start = end - size * TRIPLE_LEN;
        slices.push(Slice { index, start, end });
        end = start;
    }

    debug_assert_eq!(end, 0);
    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn assert_valid(slices: &[Slice], buffer_len: usize, worker_count: usize) {
        assert_eq!(slices.len(), worker_count);

        // Coverage and disjointness: sorted by start, the slices must tile [0, len)
        let mut sorted = slices.to_vec();
        sorted.sort_by_key(|s| (s.start, s.end));
        let mut cursor = 0;
        for slice in &sorted {
            assert_eq!(slice.start, cursor, "gap or overlap at {:?}", slice);
            assert!(slice.start <= slice.end);
            assert_eq!(slice.start % 3, 0);
            assert_eq!(slice.len() % 3, 0);
            cursor = slice.end;
        }
        assert_eq!(cursor, buffer_len);

        let min = slices.iter().map(Slice::triple_count).min().unwrap();
        let max = slices.iter().map(Slice::triple_count).max().unwrap();
        assert!(max - min <= 1, "unbalanced: min={} max={}", min, max);

        for (i, slice) in slices.iter().enumerate() {
            assert_eq!(slice.index, i);
        }
    }

    #[test]
    fn test_partition_properties() {
        for triples in 0..64 {
            for workers in 1..12 {
                let len = triples * 3;
                let slices = partition(len, workers).unwrap();
                assert_valid(&slices, len, workers);
            }
        }
    }

    #[test]
    fn test_even_split() {
        let slices = partition(45, 5).unwrap();
        assert!(slices.iter().all(|s| s.triple_count() == 3));
        assert_eq!(slices[0], Slice { index: 0, start: 36, end: 45 });
        assert_eq!(slices[4], Slice { index: 4, start: 0, end: 9 });
    }

    #[test]
    fn test_remainder_goes_to_trailing_slices() {
        let slices = partition(51, 5).unwrap();
        let sizes: Vec<usize> = slices.iter().map(Slice::triple_count).collect();
        assert_eq!(sizes, vec![3, 3, 3, 4, 4]);

        // Walks backward from the end of the buffer
        assert_eq!(slices[0], Slice { index: 0, start: 42, end: 51 });
        assert_eq!(slices[3], Slice { index: 3, start: 12, end: 24 });
        assert_eq!(slices[4], Slice { index: 4, start: 0, end: 12 });
    }

    #[test]
    fn test_more_workers_than_triples() {
        let slices = partition(6, 4).unwrap();
        let sizes: Vec<usize> = slices.iter().map(Slice::triple_count).collect();
        assert_eq!(sizes, vec![0, 0, 1, 1]);
        assert!(slices[0].is_empty());
    }

    #[test]
    fn test_single_worker_covers_everything() {
        let slices = partition(300, 1).unwrap();
        assert_eq!(slices, vec![Slice { index: 0, start: 0, end: 300 }]);
    }

    #[test]
    fn test_invalid_arguments() {
        assert_eq!(partition(9, 0).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(partition(10, 2).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
}
