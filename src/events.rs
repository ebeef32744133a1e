//! Per-evaluation progress events.
//!
//! The evaluator can be wired to a [`flume`] channel to report every node
//! claim and terminal transition. Tests use this to instrument laziness and
//! memoization; callers can use it for progress reporting on large batches.
//! Emission is best-effort: a dropped receiver never affects evaluation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What happened to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalEventKind {
    /// The node was claimed: Pending -> Running, operation about to run.
    Claimed,
    /// The operation returned a value.
    Finished,
    /// The node reached a failed terminal state (computation error,
    /// propagated dependency failure, or deadline).
    Failed,
}

/// One scheduling event within an evaluation run.
#[derive(Clone, Debug)]
pub struct EvalEvent {
    pub when: DateTime<Utc>,
    pub run_id: Uuid,
    pub node: String,
    pub kind: EvalEventKind,
}

impl EvalEvent {
    pub(crate) fn now(run_id: Uuid, node: impl Into<String>, kind: EvalEventKind) -> Self {
        Self {
            when: Utc::now(),
            run_id,
            node: node.into(),
            kind,
        }
    }
}

/// Create an unbounded event channel for observing evaluations.
#[must_use]
pub fn channel() -> (flume::Sender<EvalEvent>, flume::Receiver<EvalEvent>) {
    flume::unbounded()
}
