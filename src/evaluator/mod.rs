//! The evaluator: lazy, memoizing, concurrent resolution of a requested
//! output set against a [`GraphInstance`].
//!
//! One call to [`Evaluator::evaluate`] owns all mutable state for that run: a
//! per-node state cache (`Pending | Running | Done | Failed`), a ready queue,
//! and a [`JoinSet`] of in-flight operations. The coordinator loop claims
//! ready nodes (the Pending -> Running transition is atomic because only the
//! coordinator touches the cache), spawns their operations onto a
//! semaphore-bounded worker pool, and joins results until the dependency
//! closure is terminal. Each node's operation runs at most once per
//! evaluation no matter how many requested outputs fan in to it.
//!
//! Failures are local: a failed operation poisons its own node and, via
//! propagated failures, its transitive dependents. Unrelated branches in the
//! same call still produce values.

mod closure;

use std::collections::VecDeque;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::instrument;
use uuid::Uuid;

use crate::config::EvalConfig;
use crate::events::{EvalEvent, EvalEventKind};
use crate::graph::{ArgSpec, GraphInstance, NodeSpec, Visibility};
use crate::ops::ComputeError;
use crate::value::Value;

use closure::{dependency_closure, Closure};

/// A request that cannot be evaluated at all.
///
/// Rejected before any closure computation or operation execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RequestError {
    #[error("unknown output name `{0}`")]
    #[diagnostic(
        code(cadenza::request::unknown_name),
        help("Request public node names, or expand a category through the catalog first.")
    )]
    UnknownName(String),

    #[error("`{0}` is an internal node and cannot be requested directly")]
    #[diagnostic(code(cadenza::request::internal_node))]
    Internal(String),
}

/// Terminal failure recorded for one node during one evaluation.
#[derive(Debug, Clone, Error)]
pub enum NodeFailure {
    /// This node's own operation signalled an error.
    #[error("operation failed: {source}")]
    Computation {
        #[source]
        source: ComputeError,
    },

    /// A dependency failed; this node's operation was never invoked.
    /// `origin` names the node whose operation originally failed.
    #[error("dependency `{origin}` failed: {message}")]
    Propagated { origin: String, message: String },

    /// The evaluation deadline elapsed before this node was claimed, or
    /// before one of its dependencies was claimed.
    #[error("evaluation deadline elapsed before this node could run")]
    TimedOut,
}

impl NodeFailure {
    /// Stable short label, used by the extractor's failure markers.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            NodeFailure::Computation { .. } => "computation",
            NodeFailure::Propagated { .. } => "propagated",
            NodeFailure::TimedOut => "timeout",
        }
    }
}

/// Per-node lifecycle within one evaluation call.
#[derive(Debug)]
enum NodeState {
    Pending,
    Running,
    Done(Value),
    Failed(NodeFailure),
}

/// Terminal results for one evaluation call.
///
/// Contains every node in the dependency closure, internal nodes included;
/// use [`extract`](crate::extract::extract) to project the public view.
#[derive(Debug)]
pub struct EvalReport {
    pub run_id: Uuid,
    /// Nodes whose operation was actually invoked, in claim order.
    pub ran: Vec<String>,
    outcomes: FxHashMap<String, Result<Value, NodeFailure>>,
}

impl EvalReport {
    /// Terminal outcome for a node in the closure.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&Result<Value, NodeFailure>> {
        self.outcomes.get(name)
    }

    /// All terminal outcomes (unordered).
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &Result<Value, NodeFailure>)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Executes requested outputs against graph instances.
///
/// Stateless between calls: all mutable evaluation state lives inside
/// `evaluate`, so one evaluator can serve many series, and evaluations of
/// different series are fully independent.
#[derive(Clone, Debug)]
pub struct Evaluator {
    config: EvalConfig,
    events: Option<flume::Sender<EvalEvent>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl Evaluator {
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Attach an event channel; every claim and terminal transition is sent.
    #[must_use]
    pub fn with_events(mut self, sender: flume::Sender<EvalEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, run_id: Uuid, node: &str, kind: EvalEventKind) {
        if let Some(sender) = &self.events {
            let _ = sender.send(EvalEvent::now(run_id, node, kind));
        }
    }

    /// Resolve `requested` against `instance`.
    ///
    /// Computes the dependency closure of the requested names, executes it
    /// with memoization and bounded concurrency, and returns a terminal
    /// outcome for every closure member. Per-node failures are reported in
    /// the result map; only a malformed request aborts the call.
    #[instrument(skip_all, fields(requested = requested.len()))]
    pub async fn evaluate(
        &self,
        instance: &GraphInstance,
        requested: &[String],
    ) -> Result<EvalReport, RequestError> {
        let definition = instance.definition();
        for name in requested {
            let node = definition
                .node(name)
                .ok_or_else(|| RequestError::UnknownName(name.clone()))?;
            if node.visibility == Visibility::Internal {
                return Err(RequestError::Internal(name.clone()));
            }
        }

        let run_id = Uuid::new_v4();
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let Closure {
            members,
            mut pending_deps,
            dependents,
            ready,
        } = dependency_closure(definition, requested);

        tracing::debug!(%run_id, closure = members.len(), "evaluation started");

        let mut states: FxHashMap<String, NodeState> = members
            .iter()
            .map(|name| (name.clone(), NodeState::Pending))
            .collect();
        let mut ready: VecDeque<String> = ready.into();
        let mut in_flight: JoinSet<(String, Result<Value, ComputeError>)> = JoinSet::new();
        let mut task_names: FxHashMap<tokio::task::Id, String> = FxHashMap::default();
        let mut ran: Vec<String> = Vec::new();

        loop {
            while let Some(name) = ready.pop_front() {
                // Claim: only the coordinator transitions Pending -> Running,
                // so a node can never be scheduled twice.
                let node = definition
                    .node(&name)
                    .expect("closure members come from the definition");

                if deadline.is_some_and(|d| Instant::now() >= d) {
                    states.insert(name.clone(), NodeState::Failed(NodeFailure::TimedOut));
                    self.emit(run_id, &name, EvalEventKind::Failed);
                    settle_dependents(&name, &dependents, &mut pending_deps, &mut ready);
                    continue;
                }

                if let Some(failure) = inherited_failure(node, &states) {
                    states.insert(name.clone(), NodeState::Failed(failure));
                    self.emit(run_id, &name, EvalEventKind::Failed);
                    settle_dependents(&name, &dependents, &mut pending_deps, &mut ready);
                    continue;
                }

                let args = resolve_args(node, instance, &states);
                states.insert(name.clone(), NodeState::Running);
                ran.push(name.clone());
                self.emit(run_id, &name, EvalEventKind::Claimed);

                let op = node.op.clone();
                let semaphore = Arc::clone(&semaphore);
                let task_name = name.clone();
                let handle = in_flight.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("evaluation semaphore is never closed");
                    let result = op.call(&args);
                    (name, result)
                });
                task_names.insert(handle.id(), task_name);
            }

            match in_flight.join_next_with_id().await {
                None => break,
                Some(Ok((id, (name, result)))) => {
                    task_names.remove(&id);
                    match result {
                        Ok(value) => {
                            states.insert(name.clone(), NodeState::Done(value));
                            self.emit(run_id, &name, EvalEventKind::Finished);
                        }
                        Err(error) => {
                            tracing::debug!(%run_id, node = %name, %error, "operation failed");
                            states.insert(
                                name.clone(),
                                NodeState::Failed(NodeFailure::Computation { source: error }),
                            );
                            self.emit(run_id, &name, EvalEventKind::Failed);
                        }
                    }
                    settle_dependents(&name, &dependents, &mut pending_deps, &mut ready);
                }
                // A panicking operation fails its own node, like any other
                // computation error; the rest of the closure still settles.
                Some(Err(join_error)) => {
                    let name = task_names
                        .remove(&join_error.id())
                        .expect("every spawned task is tracked by id");
                    tracing::error!(%run_id, node = %name, %join_error, "operation panicked");
                    states.insert(
                        name.clone(),
                        NodeState::Failed(NodeFailure::Computation {
                            source: ComputeError::Panicked(join_error.to_string()),
                        }),
                    );
                    self.emit(run_id, &name, EvalEventKind::Failed);
                    settle_dependents(&name, &dependents, &mut pending_deps, &mut ready);
                }
            }
        }

        let outcomes = states
            .into_iter()
            .map(|(name, state)| {
                let outcome = match state {
                    NodeState::Done(value) => Ok(value),
                    NodeState::Failed(failure) => Err(failure),
                    NodeState::Pending | NodeState::Running => {
                        unreachable!("evaluation loop only exits when the closure is terminal")
                    }
                };
                (name, outcome)
            })
            .collect();

        tracing::debug!(%run_id, executed = ran.len(), "evaluation finished");
        Ok(EvalReport {
            run_id,
            ran,
            outcomes,
        })
    }
}

/// Decrement dependents' unresolved counts; queue those that become ready.
fn settle_dependents(
    name: &str,
    dependents: &FxHashMap<String, Vec<String>>,
    pending_deps: &mut FxHashMap<String, usize>,
    ready: &mut VecDeque<String>,
) {
    let Some(deps) = dependents.get(name) else {
        return;
    };
    let mut newly_ready: Vec<&String> = Vec::new();
    for dependent in deps {
        if let Some(count) = pending_deps.get_mut(dependent) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                newly_ready.push(dependent);
            }
        }
    }
    newly_ready.sort_unstable();
    ready.extend(newly_ready.into_iter().cloned());
}

/// If any dependency of `node` failed, the failure this node inherits.
///
/// Timeouts stay timeouts so a requested output behind a timed-out chain is
/// reported as such; other failures become `Propagated` carrying the
/// originating node, even across multiple propagation hops.
fn inherited_failure(node: &NodeSpec, states: &FxHashMap<String, NodeState>) -> Option<NodeFailure> {
    for dep in node.dependencies() {
        if let Some(NodeState::Failed(failure)) = states.get(dep) {
            return Some(match failure {
                NodeFailure::TimedOut => NodeFailure::TimedOut,
                NodeFailure::Computation { source } => NodeFailure::Propagated {
                    origin: dep.to_string(),
                    message: source.to_string(),
                },
                NodeFailure::Propagated { origin, message } => NodeFailure::Propagated {
                    origin: origin.clone(),
                    message: message.clone(),
                },
            });
        }
    }
    None
}

/// Resolve a node's argument list to concrete values.
///
/// Only called once all dependencies are `Done`; the bind step guarantees
/// every referenced raw input is present.
fn resolve_args(
    node: &NodeSpec,
    instance: &GraphInstance,
    states: &FxHashMap<String, NodeState>,
) -> Vec<Value> {
    node.args
        .iter()
        .map(|arg| match arg {
            ArgSpec::Literal(value) => value.clone(),
            ArgSpec::Input(name) => instance
                .input(name)
                .expect("referenced raw inputs are validated at bind time")
                .clone(),
            ArgSpec::Node(name) => match states.get(name.as_str()) {
                Some(NodeState::Done(value)) => value.clone(),
                _ => unreachable!("nodes are claimed only after their dependencies are Done"),
            },
        })
        .collect()
}
