//! Mock worker transport for testing
//!
//! Scans each slice in-process at dispatch time and hands the count back on
//! await. Failures can be scripted per worker index so coordinator error paths
//! can be exercised without threads, processes or sockets.
//!
//! Clones share their state, so a test can keep one clone for inspection while
//! the coordinator owns another.
//!
//! # Example
//!
//! ```
//! use scanpulse::transport::{MockTransport, WorkerTransport};
//! use scanpulse::partition::Slice;
//! use scanpulse::util::TripleBuffer;
//!
//! let buffer = TripleBuffer::from_triples(&[[1, 2, 3]]);
//! let mut transport = MockTransport::new(1000);
//! let handle = transport.dispatch(&buffer, Slice { index: 0, start: 0, end: 3 }).unwrap();
//! assert_eq!(transport.await_result(handle).unwrap().count, 1);
//! ```

use super::{WorkerHandle, WorkerTransport};
use crate::error::{Result, ScanError};
use crate::partition::Slice;
use crate::stats::PartialResult;
use crate::util::TripleBuffer;
use crate::worker::ScanWorker;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Failure injected for one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Refuse to start the worker
    Spawn,
    /// Worker closes its channel before delivering a full result
    Truncated,
    /// Worker delivers something that is not a count
    Malformed,
}

#[derive(Debug, Default)]
struct MockState {
    failures: HashMap<usize, MockFailure>,
    dispatched: Vec<Slice>,
    awaited: Vec<usize>,
    shutdowns: usize,
}

#[derive(Clone)]
pub struct MockTransport {
    threshold: u32,
    state: Arc<Mutex<MockState>>,
}

pub struct MockHandle {
    slice: Slice,
    count: u64,
}

impl WorkerHandle for MockHandle {
    fn slice(&self) -> &Slice {
        &self.slice
    }

    fn identity(&self) -> String {
        format!("mock {}", self.slice.index)
    }
}

impl MockTransport {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Make `worker` fail with `failure` (at dispatch for `Spawn`, on await
    /// otherwise).
    pub fn fail_worker(&self, worker: usize, failure: MockFailure) {
        self.state.lock().unwrap().failures.insert(worker, failure);
    }

    /// Slices dispatched so far, in dispatch order
    pub fn dispatched(&self) -> Vec<Slice> {
        self.state.lock().unwrap().dispatched.clone()
    }

    /// Worker indices awaited so far, in await order
    pub fn awaited(&self) -> Vec<usize> {
        self.state.lock().unwrap().awaited.clone()
    }

    pub fn shutdown_count(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    fn failure_for(&self, worker: usize) -> Option<MockFailure> {
        self.state.lock().unwrap().failures.get(&worker).copied()
    }
}

impl WorkerTransport for MockTransport {
    type Handle = MockHandle;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn dispatch(&mut self, buffer: &TripleBuffer, slice: Slice) -> Result<MockHandle> {
        if self.failure_for(slice.index) == Some(MockFailure::Spawn) {
            return Err(ScanError::spawn(
                format!("mock worker {}", slice.index),
                std::io::Error::new(std::io::ErrorKind::Other, "injected spawn failure"),
            ));
        }

        let count = ScanWorker::new(slice.index, self.threshold).scan(buffer.view(&slice)?)?;
        self.state.lock().unwrap().dispatched.push(slice);
        Ok(MockHandle { slice, count })
    }

    fn await_result(&mut self, handle: MockHandle) -> Result<PartialResult> {
        let worker = handle.slice.index;
        self.state.lock().unwrap().awaited.push(worker);

        match self.failure_for(worker) {
            Some(MockFailure::Truncated) => Err(ScanError::protocol(format!(
                "mock worker {} closed after 4 of 8 reply bytes",
                worker
            ))),
            Some(MockFailure::Malformed) => Err(ScanError::Aggregation(format!(
                "mock worker {} replied with a non-numeric count",
                worker
            ))),
            _ => Ok(PartialResult::new(worker, handle.count)),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.state.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}
