//! Pixel sources
//!
//! Produce the [`TripleBuffer`] a run scans:
//! - [`load_bitmap`] decodes an image file (BMP) into packed RGB triples with
//!   row padding removed
//! - [`synthetic`] fills a buffer from a seeded generator for benchmarking
//!
//! Channel order within a triple does not affect the count, so decoded pixels
//! are kept in RGB order regardless of how the file stores them.

use crate::error::{Result, ScanError};
use crate::util::{TripleBuffer, TRIPLE_LEN};
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::Path;

/// Decode the image at `path` into one triple per pixel.
pub fn load_bitmap(path: &Path) -> Result<TripleBuffer> {
    let image = image::open(path)
        .map_err(|e| ScanError::Decode(format!("{}: {}", path.display(), e)))?;

    let (width, height) = (image.width(), image.height());
    let bytes = image.to_rgb8().into_raw();

    tracing::info!(
        path = %path.display(),
        width,
        height,
        triples = bytes.len() / TRIPLE_LEN,
        "decoded bitmap"
    );

    TripleBuffer::new(bytes)
        .map_err(|e| ScanError::Decode(format!("{}: {}", path.display(), e)))
}

/// Generate `triples` pseudo-random triples from `seed`.
///
/// The same seed always yields the same buffer.
pub fn synthetic(triples: usize, seed: u64) -> Result<TripleBuffer> {
    let len = triples.checked_mul(TRIPLE_LEN).ok_or_else(|| {
        ScanError::InvalidArgument(format!("{} triples overflow the buffer size", triples))
    })?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);

    tracing::debug!(triples, seed, "generated synthetic buffer");
    TripleBuffer::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_load_bitmap_drops_row_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.bmp");

        // 5 pixels wide: 15 bytes per row on disk, padded to 16
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8, y as u8, 7]));
        image.save(&path).unwrap();

        let buffer = load_bitmap(&path).unwrap();
        assert_eq!(buffer.triple_count(), 15);
        assert_eq!(buffer.as_bytes(), image.into_raw().as_slice());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_bitmap(Path::new("/nonexistent/img.bmp")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("/nonexistent/img.bmp"));
    }

    #[test]
    fn test_load_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bmp");
        std::fs::write(&path, b"BM not really a bitmap").unwrap();

        assert_eq!(load_bitmap(&path).unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let a = synthetic(1000, 9).unwrap();
        let b = synthetic(1000, 9).unwrap();
        let c = synthetic(1000, 10).unwrap();

        assert_eq!(a.len(), 3000);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_synthetic_empty() {
        assert!(synthetic(0, 0).unwrap().is_empty());
    }
}
