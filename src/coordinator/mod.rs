//! Coordinator module
//!
//! Orchestrates one scan run over any [`WorkerTransport`]:
//!
//! ```text
//! Idle -> Partitioning -> Dispatching -> AwaitingResults -> Aggregating -> Done
//! ```
//!
//! Every slice is dispatched before any result is awaited, so all workers run
//! concurrently. The first failure aborts the run; the error carries the
//! failing worker's index and byte range. Handles still outstanding at that
//! point are dropped, which releases their threads, processes or sockets.

use crate::config::{AggregationKind, Config, Strategy};
use crate::distributed::NetworkTransport;
use crate::error::{Result, ScanError};
use crate::partition::partition;
use crate::stats::aggregator::build_aggregator;
use crate::stats::{PartialResult, RunReport};
use crate::transport::{ThreadTransport, WorkerHandle, WorkerTransport};
use crate::util::TripleBuffer;
use crate::worker::reduction::count_parallel;
use std::time::Instant;

/// Lifecycle of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Partitioning,
    Dispatching,
    AwaitingResults,
    Aggregating,
    Done,
}

/// Runs scans over a worker transport
pub struct Coordinator<T: WorkerTransport> {
    transport: T,
    aggregation: AggregationKind,
    state: RunState,
}

impl<T: WorkerTransport> Coordinator<T> {
    pub fn new(transport: T, aggregation: AggregationKind) -> Self {
        Self {
            transport,
            aggregation,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Count matching triples in `buffer` using `worker_count` workers.
    pub fn run(&mut self, buffer: &TripleBuffer, worker_count: usize) -> Result<u64> {
        self.run_report(buffer, worker_count).map(|report| report.total)
    }

    /// Like [`run`](Self::run), also returning per-worker partials and timing.
    pub fn run_report(&mut self, buffer: &TripleBuffer, worker_count: usize) -> Result<RunReport> {
        let start = Instant::now();
        let strategy = self.transport.name();

        tracing::info!(
            strategy,
            workers = worker_count,
            bytes = buffer.len(),
            "starting scan"
        );

        match self.execute(buffer, worker_count) {
            Ok((total, partials)) => {
                self.transition(RunState::Done);
                let elapsed = start.elapsed();
                tracing::info!(strategy, total, elapsed_ms = elapsed.as_millis() as u64, "scan complete");

                Ok(RunReport {
                    strategy,
                    worker_count,
                    buffer_len: buffer.len(),
                    total,
                    partials,
                    elapsed,
                })
            }
            Err(e) => {
                tracing::error!(strategy, state = ?self.state, "scan aborted: {}", e);
                if let Err(cleanup) = self.transport.shutdown() {
                    tracing::warn!(strategy, "transport shutdown failed: {}", cleanup);
                }
                self.state = RunState::Idle;
                Err(e)
            }
        }
    }

    fn execute(&mut self, buffer: &TripleBuffer, worker_count: usize) -> Result<(u64, Vec<PartialResult>)> {
        self.transition(RunState::Partitioning);
        let slices = partition(buffer.len(), worker_count)?;

        self.transition(RunState::Dispatching);
        let mut handles = Vec::with_capacity(slices.len());
        for slice in slices {
            let handle = self
                .transport
                .dispatch(buffer, slice)
                .map_err(|e| e.for_worker(&slice))?;
            tracing::debug!(
                worker = slice.index,
                start = slice.start,
                end = slice.end,
                identity = %handle.identity(),
                "dispatched"
            );
            handles.push(handle);
        }

        self.transition(RunState::AwaitingResults);
        let mut partials = Vec::with_capacity(handles.len());
        for handle in handles {
            let slice = *handle.slice();
            let partial = self
                .transport
                .await_result(handle)
                .map_err(|e| e.for_worker(&slice))?;
            if partial.worker != slice.index {
                return Err(ScanError::Aggregation(format!(
                    "result for worker {} arrived on the handle for worker {}",
                    partial.worker, slice.index
                ))
                .for_worker(&slice));
            }
            partials.push(partial);
        }

        self.transition(RunState::Aggregating);
        let aggregator = build_aggregator(self.aggregation, worker_count);
        for partial in &partials {
            aggregator.merge(*partial)?;
        }
        let total = aggregator.total()?;

        self.transport.shutdown()?;
        Ok((total, aggregator.partials()))
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "coordinator state");
        self.state = next;
    }
}

/// Run the strategy selected in `config` over `buffer`.
pub fn run_strategy(config: &Config, buffer: &TripleBuffer) -> Result<RunReport> {
    let scan = &config.scan;

    match scan.strategy {
        Strategy::Threads => {
            Coordinator::new(ThreadTransport::new(scan.threshold), scan.aggregation)
                .run_report(buffer, scan.workers)
        }
        #[cfg(unix)]
        Strategy::Processes => Coordinator::new(
            crate::transport::ProcessTransport::new(scan.threshold),
            scan.aggregation,
        )
        .run_report(buffer, scan.workers),
        #[cfg(not(unix))]
        Strategy::Processes => Err(ScanError::InvalidArgument(
            "the processes strategy requires a Unix platform".to_string(),
        )),
        Strategy::Network => {
            let transport = NetworkTransport::new(&config.network, scan.threshold)?;
            Coordinator::new(transport, scan.aggregation).run_report(buffer, scan.workers)
        }
        Strategy::Reduction => {
            let start = Instant::now();
            tracing::info!(strategy = "reduction", workers = scan.workers, bytes = buffer.len(), "starting scan");
            let total = count_parallel(buffer, scan.workers, scan.threshold)?;
            let elapsed = start.elapsed();
            tracing::info!(strategy = "reduction", total, elapsed_ms = elapsed.as_millis() as u64, "scan complete");

            Ok(RunReport {
                strategy: Strategy::Reduction.name(),
                worker_count: scan.workers,
                buffer_len: buffer.len(),
                total,
                partials: Vec::new(),
                elapsed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::mock::{MockFailure, MockTransport};
    use crate::util::TRIPLE_LEN;
    use crate::worker::{count_below, DEFAULT_THRESHOLD};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn random_buffer(triples: usize, seed: u64) -> TripleBuffer {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let bytes: Vec<u8> = (0..triples * TRIPLE_LEN).map(|_| rng.gen_range(0..24)).collect();
        TripleBuffer::new(bytes).unwrap()
    }

    #[test]
    fn test_mock_run_matches_single_pass() {
        let buffer = random_buffer(17, 42);
        let mock = MockTransport::new(DEFAULT_THRESHOLD);
        let mut coordinator = Coordinator::new(mock.clone(), AggregationKind::Slots);

        let report = coordinator.run_report(&buffer, 5).unwrap();

        assert_eq!(report.total, count_below(buffer.as_bytes(), DEFAULT_THRESHOLD));
        assert_eq!(report.strategy, "mock");
        assert_eq!(report.partials.len(), 5);
        assert_eq!(coordinator.state(), RunState::Done);

        let sizes: Vec<usize> = mock.dispatched().iter().map(|s| s.triple_count()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 4, 4]);
        assert_eq!(mock.awaited(), vec![0, 1, 2, 3, 4]);
        assert_eq!(mock.shutdown_count(), 1);
    }

    #[test]
    fn test_spawn_failure_names_worker() {
        let buffer = random_buffer(15, 1);
        let mock = MockTransport::new(DEFAULT_THRESHOLD);
        mock.fail_worker(2, MockFailure::Spawn);

        let mut coordinator = Coordinator::new(mock.clone(), AggregationKind::Slots);
        let err = coordinator.run(&buffer, 5).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WorkerSpawn);
        assert_eq!(err.worker(), Some(2));
        // Slices go out back to front: worker 2 covers triples 6..9
        assert_eq!(err.to_string(), "worker 2 failed on bytes 18..27");
        assert!(mock.awaited().is_empty());
        assert_eq!(mock.shutdown_count(), 1);
        assert_eq!(coordinator.state(), RunState::Idle);
    }

    #[test]
    fn test_truncated_reply_is_transport_error() {
        let buffer = random_buffer(15, 2);
        let mock = MockTransport::new(DEFAULT_THRESHOLD);
        mock.fail_worker(3, MockFailure::Truncated);

        let err = Coordinator::new(mock, AggregationKind::Locked)
            .run(&buffer, 5)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.worker(), Some(3));
    }

    #[test]
    fn test_malformed_reply_is_aggregation_error() {
        let buffer = random_buffer(15, 3);
        let mock = MockTransport::new(DEFAULT_THRESHOLD);
        mock.fail_worker(0, MockFailure::Malformed);

        let err = Coordinator::new(mock, AggregationKind::Slots)
            .run(&buffer, 5)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregation);
        assert_eq!(err.worker(), Some(0));
    }

    #[test]
    fn test_invalid_buffer_length() {
        let buffer = random_buffer(4, 4);
        let err = Coordinator::new(MockTransport::new(DEFAULT_THRESHOLD), AggregationKind::Slots)
            .run(&buffer, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.worker(), None);
    }

    #[test]
    fn test_coordinator_is_reusable() {
        let buffer = random_buffer(100, 5);
        let expected = count_below(buffer.as_bytes(), DEFAULT_THRESHOLD);
        let mut coordinator =
            Coordinator::new(ThreadTransport::new(DEFAULT_THRESHOLD), AggregationKind::Slots);

        assert_eq!(coordinator.run(&buffer, 3).unwrap(), expected);
        assert_eq!(coordinator.run(&buffer, 7).unwrap(), expected);
    }

    #[test]
    fn test_strategies_agree() {
        let buffer = random_buffer(10_000, 6);
        let expected = count_below(buffer.as_bytes(), DEFAULT_THRESHOLD);

        let mut strategies = vec![Strategy::Threads, Strategy::Reduction];
        if cfg!(unix) {
            strategies.push(Strategy::Processes);
        }

        for strategy in strategies {
            for aggregation in [AggregationKind::Slots, AggregationKind::Locked] {
                let mut config = Config::default();
                config.scan.strategy = strategy;
                config.scan.aggregation = aggregation;

                let report = run_strategy(&config, &buffer).unwrap();
                assert_eq!(report.total, expected, "{} / {:?}", strategy, aggregation);
                assert_eq!(report.strategy, strategy.name());
            }
        }
    }

    #[test]
    fn test_more_workers_than_triples() {
        let buffer = random_buffer(2, 7);
        let mut config = Config::default();
        config.scan.workers = 5;

        let report = run_strategy(&config, &buffer).unwrap();
        assert_eq!(report.partials.len(), 5);
        assert_eq!(report.total, count_below(buffer.as_bytes(), DEFAULT_THRESHOLD));
    }
}
