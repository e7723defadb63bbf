//! Thread-pool transport
//!
//! Each slice runs on its own named OS thread. The buffer is shared through
//! its reference-counted bytes; every thread reads only its own slice, so the
//! buffer needs no locking.

use super::{WorkerHandle, WorkerTransport};
use crate::error::{Result, ScanError};
use crate::partition::Slice;
use crate::stats::PartialResult;
use crate::util::TripleBuffer;
use crate::worker::ScanWorker;
use std::thread::JoinHandle;

pub struct ThreadTransport {
    threshold: u32,
}

impl ThreadTransport {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

pub struct ThreadHandle {
    slice: Slice,
    join: JoinHandle<Result<u64>>,
}

impl WorkerHandle for ThreadHandle {
    fn slice(&self) -> &Slice {
        &self.slice
    }

    fn identity(&self) -> String {
        format!("thread {:?}", self.join.thread().id())
    }
}

impl WorkerTransport for ThreadTransport {
    type Handle = ThreadHandle;

    fn name(&self) -> &'static str {
        "threads"
    }

    fn dispatch(&mut self, buffer: &TripleBuffer, slice: Slice) -> Result<ThreadHandle> {
        // Fail in the caller rather than inside the thread
        buffer.view(&slice)?;

        let buffer = buffer.clone();
        let worker = ScanWorker::new(slice.index, self.threshold);
        let join = std::thread::Builder::new()
            .name(format!("scan-worker-{}", slice.index))
            .spawn(move || worker.scan(buffer.view(&slice)?))
            .map_err(|e| ScanError::spawn(format!("thread for worker {}", slice.index), e))?;

        Ok(ThreadHandle { slice, join })
    }

    fn await_result(&mut self, handle: ThreadHandle) -> Result<PartialResult> {
        let worker = handle.slice.index;
        let count = handle
            .join
            .join()
            .map_err(|_| ScanError::Aggregation(format!("worker thread {} panicked", worker)))??;

        Ok(PartialResult::new(worker, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::partition::partition;
    use crate::worker::{count_below, DEFAULT_THRESHOLD};

    #[test]
    fn test_dispatch_and_await() {
        let bytes: Vec<u8> = (0..3000u32).map(|i| (i % 17) as u8).collect();
        let buffer = TripleBuffer::new(bytes).unwrap();
        let mut transport = ThreadTransport::new(DEFAULT_THRESHOLD);

        let handles: Vec<ThreadHandle> = partition(buffer.len(), 4)
            .unwrap()
            .into_iter()
            .map(|slice| transport.dispatch(&buffer, slice).unwrap())
            .collect();
        assert!(handles[0].identity().starts_with("thread"));

        let total: u64 = handles
            .into_iter()
            .map(|h| transport.await_result(h).unwrap().count)
            .sum();

        assert_eq!(total, count_below(buffer.as_bytes(), DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_out_of_range_slice_rejected_at_dispatch() {
        let buffer = TripleBuffer::from_triples(&[[1, 1, 1]]);
        let mut transport = ThreadTransport::new(DEFAULT_THRESHOLD);
        let err = transport
            .dispatch(&buffer, Slice { index: 0, start: 0, end: 6 })
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
