//! Partial-result aggregation
//!
//! Two realizations of the same contract:
//!
//! - [`SlotAggregator`]: one write-once slot per worker index, summed when the
//!   total is read. No lock; the worker count must be known up front.
//! - [`LockedAggregator`]: a single accumulator behind a mutex that is held only
//!   for the duration of each add.
//!
//! Both accept merges from any number of threads concurrently. Reading the
//! total before every expected partial has arrived is an error in both.
//!
//! # Example
//!
//! ```
//! use scanpulse::stats::{Aggregator, PartialResult, SlotAggregator};
//!
//! let aggregator = SlotAggregator::new(2);
//! aggregator.merge(PartialResult::new(1, 40)).unwrap();
//! aggregator.merge(PartialResult::new(0, 2)).unwrap();
//! assert_eq!(aggregator.total().unwrap(), 42);
//! ```

use crate::config::AggregationKind;
use crate::error::{Result, ScanError};
use crate::stats::PartialResult;
use std::sync::{Mutex, OnceLock};

/// Combines partial counts into a final total
pub trait Aggregator: Send + Sync {
    /// Record one worker's partial count.
    fn merge(&self, partial: PartialResult) -> Result<()>;

    /// Sum of all merged partials.
    ///
    /// Only valid once every expected partial has been merged.
    fn total(&self) -> Result<u64>;

    /// Merged partials ordered by worker index.
    fn partials(&self) -> Vec<PartialResult>;
}

/// Build the aggregator selected by `kind` for `expected` workers.
pub fn build_aggregator(kind: AggregationKind, expected: usize) -> Box<dyn Aggregator> {
    match kind {
        AggregationKind::Slots => Box::new(SlotAggregator::new(expected)),
        AggregationKind::Locked => Box::new(LockedAggregator::new(expected)),
    }
}

fn check_index(partial: &PartialResult, expected: usize) -> Result<()> {
    if partial.worker >= expected {
        return Err(ScanError::Aggregation(format!(
            "partial from worker {} but only {} workers expected",
            partial.worker, expected
        )));
    }
    Ok(())
}

fn duplicate(worker: usize) -> ScanError {
    ScanError::Aggregation(format!("worker {} reported more than once", worker))
}

/// Lock-free aggregator with one slot per worker
#[derive(Debug)]
pub struct SlotAggregator {
    slots: Vec<OnceLock<u64>>,
}

impl SlotAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            slots: (0..expected).map(|_| OnceLock::new()).collect(),
        }
    }
}

impl Aggregator for SlotAggregator {
    fn merge(&self, partial: PartialResult) -> Result<()> {
        check_index(&partial, self.slots.len())?;
        self.slots[partial.worker]
            .set(partial.count)
            .map_err(|_| duplicate(partial.worker))
    }

    fn total(&self) -> Result<u64> {
        let mut total: u64 = 0;
        for (worker, slot) in self.slots.iter().enumerate() {
            let count = slot.get().ok_or_else(|| {
                ScanError::Aggregation(format!("missing partial result from worker {}", worker))
            })?;
            total = total
                .checked_add(*count)
                .ok_or_else(|| ScanError::Aggregation("total overflowed u64".to_string()))?;
        }
        Ok(total)
    }

    fn partials(&self) -> Vec<PartialResult> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(worker, slot)| slot.get().map(|&count| PartialResult::new(worker, count)))
            .collect()
    }
}

/// Accumulator state guarded by [`LockedAggregator`]'s mutex
#[derive(Debug, Default)]
struct AggregateState {
    total: u64,
    merged: Vec<PartialResult>,
    seen: Vec<bool>,
}

/// Mutex-guarded shared accumulator
#[derive(Debug)]
pub struct LockedAggregator {
    expected: usize,
    state: Mutex<AggregateState>,
}

impl LockedAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            state: Mutex::new(AggregateState {
                total: 0,
                merged: Vec::with_capacity(expected),
                seen: vec![false; expected],
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, AggregateState>> {
        self.state
            .lock()
            .map_err(|_| ScanError::Aggregation("accumulator lock poisoned".to_string()))
    }
}

impl Aggregator for LockedAggregator {
    fn merge(&self, partial: PartialResult) -> Result<()> {
        check_index(&partial, self.expected)?;

        let mut state = self.lock()?;
        if state.seen[partial.worker] {
            return Err(duplicate(partial.worker));
        }
        state.total = state
            .total
            .checked_add(partial.count)
            .ok_or_else(|| ScanError::Aggregation("total overflowed u64".to_string()))?;
        state.seen[partial.worker] = true;
        state.merged.push(partial);
        Ok(())
    }

    fn total(&self) -> Result<u64> {
        let state = self.lock()?;
        if state.merged.len() != self.expected {
            return Err(ScanError::Aggregation(format!(
                "only {} of {} partial results merged",
                state.merged.len(),
                self.expected
            )));
        }
        Ok(state.total)
    }

    fn partials(&self) -> Vec<PartialResult> {
        let mut partials = match self.state.lock() {
            Ok(state) => state.merged.clone(),
            Err(poisoned) => poisoned.into_inner().merged.clone(),
        };
        partials.sort_by_key(|p| p.worker);
        partials
    }
}
