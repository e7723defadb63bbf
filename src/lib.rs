//! ScanPulse - parallel pixel-triple scanner
//!
//! Counts the RGB triples of a pixel buffer whose component product falls
//! below a threshold, splitting the work across interchangeable worker pools.
//!
//! # Architecture
//!
//! - **Partitioning**: contiguous, triple-aligned slices, remainder spread
//!   one triple at a time over the trailing workers
//! - **Transports**: threads, forked processes and TCP peers behind one
//!   [`transport::WorkerTransport`] trait
//! - **Aggregation**: write-once slots or a locked accumulator
//! - **Reduction**: a rayon pool counting over the whole buffer
//!
//! # Example
//!
//! ```
//! use scanpulse::config::AggregationKind;
//! use scanpulse::coordinator::Coordinator;
//! use scanpulse::transport::ThreadTransport;
//! use scanpulse::util::TripleBuffer;
//!
//! let buffer = TripleBuffer::from_triples(&[[1, 2, 3], [10, 10, 10], [9, 9, 9]]);
//! let mut coordinator = Coordinator::new(ThreadTransport::new(1000), AggregationKind::Slots);
//! assert_eq!(coordinator.run(&buffer, 2).unwrap(), 2);
//! ```

pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod output;
pub mod partition;
pub mod source;
pub mod stats;
pub mod transport;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{ErrorKind, Result, ScanError};
