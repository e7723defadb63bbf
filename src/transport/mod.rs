//! Worker transport abstraction
//!
//! A worker transport is the mechanism that delivers a slice to a unit of
//! parallel execution and brings its partial count back. The coordinator is
//! written once against [`WorkerTransport`]; each execution strategy supplies
//! its own implementation:
//!
//! - **thread**: one OS thread per slice, buffer shared in memory
//! - **process**: one forked process per slice, count returned over a pipe
//!   (Unix only)
//! - **network**: one peer connection per slice, see
//!   [`crate::distributed::NetworkTransport`]
//! - **mock**: scripted results and failures for tests
//!
//! # Lifecycle
//!
//! 1. `dispatch()` once per slice, returning a handle
//! 2. `await_result()` once per handle, blocking until the worker reports
//! 3. `shutdown()` after every handle has been awaited
//!
//! A handle dropped without being awaited must release whatever OS resources
//! it owns.

pub mod mock;
#[cfg(unix)]
pub mod process;
pub mod thread;

use crate::error::Result;
use crate::partition::Slice;
use crate::stats::PartialResult;
use crate::util::TripleBuffer;

/// A running worker together with the slice it was given
pub trait WorkerHandle {
    fn slice(&self) -> &Slice;

    /// Identity of the execution unit (thread id, pid, peer address)
    fn identity(&self) -> String;
}

/// Delivers slices to workers and collects their partial results
pub trait WorkerTransport {
    type Handle: WorkerHandle;

    /// Short strategy name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Start a worker on `slice` of `buffer`.
    fn dispatch(&mut self, buffer: &TripleBuffer, slice: Slice) -> Result<Self::Handle>;

    /// Block until the worker behind `handle` reports, then release it.
    fn await_result(&mut self, handle: Self::Handle) -> Result<PartialResult>;

    /// Release transport-wide resources once a run is over.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

pub use mock::MockTransport;
#[cfg(unix)]
pub use process::ProcessTransport;
pub use thread::ThreadTransport;
