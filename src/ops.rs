//! Operations: the pure functions bound to graph nodes.
//!
//! An [`Operation`] is a deterministic, side-effect-free function from a list
//! of positional [`Value`] arguments to a single result. Operations are
//! registered once in an [`OpRegistry`] at process start and referenced (never
//! copied) by graph nodes. The engine treats them as black boxes: it resolves
//! their arguments, invokes them exactly once per node per evaluation, and
//! records their result or failure.
//!
//! Operations signal domain problems (too few data points, a singular fit)
//! through [`ComputeError`] instead of panicking, so a bad series poisons only
//! the nodes that depend on it.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::value::Value;

/// Errors signalled by an operation while computing a node's value.
///
/// These are per-node, per-evaluation failures. They never abort the
/// evaluation call; the evaluator attaches them to the failed node and
/// propagates a wrapped failure to its dependents.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ComputeError {
    /// The input series is too short for this statistic.
    #[error("not enough data points: need at least {needed}, got {got}")]
    #[diagnostic(
        code(cadenza::ops::insufficient_data),
        help("Short series are accepted by the engine; only the operations that need more points fail.")
    )]
    InsufficientData { needed: usize, got: usize },

    /// An argument had the wrong runtime type.
    #[error("argument type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code(cadenza::ops::type_mismatch))]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The operation was invoked with the wrong number of arguments.
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    #[diagnostic(code(cadenza::ops::arity))]
    Arity { expected: usize, got: usize },

    /// The computation is numerically degenerate (zero variance, zero span).
    #[error("numerically singular computation: {0}")]
    #[diagnostic(code(cadenza::ops::singular))]
    Singular(String),

    /// The operation panicked. Recorded by the evaluator when it catches the
    /// panic; never returned by an operation itself.
    #[error("operation panicked: {0}")]
    #[diagnostic(code(cadenza::ops::panic))]
    Panicked(String),
}

/// A deterministic, pure computation usable as a graph node.
///
/// Arguments arrive positionally in the order declared by the node's
/// `ArgSpec` list. Implementations must not hold mutable state: the evaluator
/// may invoke them from any worker and relies on bit-identical results for
/// repeated evaluations.
pub trait Operation: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<Value, ComputeError>;
}

impl<F> Operation for F
where
    F: Fn(&[Value]) -> Result<Value, ComputeError> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> Result<Value, ComputeError> {
        self(args)
    }
}

/// Check an operation's argument count up front.
pub fn expect_arity(args: &[Value], expected: usize) -> Result<(), ComputeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ComputeError::Arity {
            expected,
            got: args.len(),
        })
    }
}

/// Catalog of named operations available to graph definitions.
///
/// Built once at startup, then shared read-only by every graph built against
/// it. Node registration resolves operation names through this registry, so a
/// typo is a setup-time [`DefinitionError`](crate::graph::DefinitionError),
/// not a runtime lookup failure.
#[derive(Clone, Default)]
pub struct OpRegistry {
    ops: FxHashMap<String, Arc<dyn Operation>>,
}

impl OpRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under `name`, replacing any previous entry.
    ///
    /// Replacement is allowed so callers can shadow a built-in with their own
    /// implementation before building a graph; a warning is traced when it
    /// happens.
    pub fn register(&mut self, name: impl Into<String>, op: impl Operation + 'static) -> &mut Self {
        let name = name.into();
        if self.ops.insert(name.clone(), Arc::new(op)).is_some() {
            tracing::warn!(op = %name, "replacing previously registered operation");
        }
        self
    }

    /// Look up an operation by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.ops.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate over registered operation names (unordered).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpRegistry")
            .field("len", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(args: &[Value]) -> Result<Value, ComputeError> {
        expect_arity(args, 1)?;
        Ok(Value::Float(args[0].as_float()? * 2.0))
    }

    #[test]
    fn registry_lookup_and_call() {
        let mut reg = OpRegistry::new();
        reg.register("double", double);
        let op = reg.get("double").unwrap();
        let out = op.call(&[Value::Float(2.5)]).unwrap();
        assert!(matches!(out, Value::Float(v) if v == 5.0));
        assert!(reg.get("triple").is_none());
    }

    #[test]
    fn arity_and_type_errors() {
        let mut reg = OpRegistry::new();
        reg.register("double", double);
        let op = reg.get("double").unwrap();
        assert!(matches!(
            op.call(&[]),
            Err(ComputeError::Arity { expected: 1, got: 0 })
        ));
        assert!(matches!(
            op.call(&[Value::Str("x".into())]),
            Err(ComputeError::TypeMismatch { .. })
        ));
    }
}
