//! Error types for the scan engine
//!
//! Every failure inside a run is fatal to that run. Errors raised while a
//! specific worker was being dispatched or awaited are wrapped in
//! [`ScanError::Worker`] so the caller can see which slice caused them.

use crate::partition::Slice;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

/// Broad category of a [`ScanError`], independent of worker context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Transport,
    Aggregation,
    WorkerSpawn,
    Decode,
}

#[derive(Debug, Error)]
pub enum ScanError {
    /// Bad partition parameters, misaligned buffer or out-of-range slice.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection refused/reset, premature close or incomplete frame.
    #[error("transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Unparsable, duplicate or missing partial result.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Thread, process or connection could not be created.
    #[error("failed to spawn worker: {context}")]
    WorkerSpawn {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode pixel source: {0}")]
    Decode(String),

    #[error("worker {worker} failed on bytes {start}..{end}")]
    Worker {
        worker: usize,
        start: usize,
        end: usize,
        #[source]
        source: Box<ScanError>,
    },
}

impl ScanError {
    pub fn transport(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    pub fn protocol(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    pub fn spawn(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::WorkerSpawn {
            context: context.into(),
            source,
        }
    }

    /// Attach the failing worker's slice to this error.
    ///
    /// Errors that already carry worker context are returned unchanged.
    pub fn for_worker(self, slice: &Slice) -> Self {
        match self {
            Self::Worker { .. } => self,
            other => Self::Worker {
                worker: slice.index,
                start: slice.start,
                end: slice.end,
                source: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Aggregation(_) => ErrorKind::Aggregation,
            Self::WorkerSpawn { .. } => ErrorKind::WorkerSpawn,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Worker { source, .. } => source.kind(),
        }
    }

    /// Index of the worker this error is attributed to, if any.
    pub fn worker(&self) -> Option<usize> {
        match self {
            Self::Worker { worker, .. } => Some(*worker),
            _ => None,
        }
    }
}
