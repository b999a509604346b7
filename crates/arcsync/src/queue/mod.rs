//! Work queue between discovery and the sync workers.
//!
//! Discovery enqueues lightweight `WorkRef`s; the pool dereferences each
//! one against the state store at execution time, so stale or duplicate
//! deliveries are harmless.

pub mod consumer;
pub mod producer;

use crate::workflow::Outcome;

pub use consumer::ConsumerPool;
pub use producer::Producer;

/// Reference to a queued sync task. Only the store id travels through the
/// channel; the full record is loaded by the worker that dequeues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRef {
    pub object_id: i64,
}

impl WorkRef {
    pub fn new(object_id: i64) -> Self {
        Self { object_id }
    }
}

/// Result of one execution attempt, emitted by the pool for callers that
/// track progress.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub object_id: i64,
    pub original_file_path: String,
    pub outcome: Outcome,
    pub error: Option<String>,
}
