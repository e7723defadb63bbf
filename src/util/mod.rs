//! Shared utilities

pub mod buffer;
pub mod time;

pub use buffer::{TripleBuffer, TRIPLE_LEN};
