//! Pixel triple buffer
//!
//! A [`TripleBuffer`] is the read-only byte sequence every worker scans. The
//! bytes live behind an `Arc` so thread workers can share them without copying
//! and forked workers simply inherit the mapping.

use crate::error::{Result, ScanError};
use crate::partition::Slice;
use std::sync::Arc;

/// Number of bytes in one pixel triple
pub const TRIPLE_LEN: usize = 3;

/// Immutable sequence of `(r, g, b)` byte triples
///
/// Invariant: `len() % 3 == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleBuffer {
    bytes: Arc<[u8]>,
}

impl TripleBuffer {
    /// Wrap raw bytes, rejecting lengths that are not a whole number of triples.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % TRIPLE_LEN != 0 {
            return Err(ScanError::InvalidArgument(format!(
                "buffer length {} is not a multiple of {}",
                bytes.len(),
                TRIPLE_LEN
            )));
        }

        Ok(Self {
            bytes: bytes.into(),
        })
    }

    /// Build a buffer from explicit triples.
    pub fn from_triples(triples: &[[u8; 3]]) -> Self {
        let bytes: Vec<u8> = triples.iter().flatten().copied().collect();
        Self {
            bytes: bytes.into(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn triple_count(&self) -> usize {
        self.bytes.len() / TRIPLE_LEN
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the bytes covered by `slice`.
    ///
    /// Fails with `InvalidArgument` when the slice is misaligned or reaches past
    /// the end of the buffer.
    pub fn view(&self, slice: &Slice) -> Result<&[u8]> {
        if slice.start > slice.end || slice.end > self.bytes.len() {
            return Err(ScanError::InvalidArgument(format!(
                "slice {}..{} out of range for buffer of {} bytes",
                slice.start,
                slice.end,
                self.bytes.len()
            )));
        }
        if slice.start % TRIPLE_LEN != 0 || slice.len() % TRIPLE_LEN != 0 {
            return Err(ScanError::InvalidArgument(format!(
                "slice {}..{} is not triple-aligned",
                slice.start, slice.end
            )));
        }

        Ok(&self.bytes[slice.start..slice.end])
    }
}

impl TryFrom<Vec<u8>> for TripleBuffer {
    type Error = ScanError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}
