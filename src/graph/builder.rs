//! GraphBuilder: registration-time validation and finalization.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::spec::{ArgSpec, GraphDefinition, NodeSpec, Visibility};
use crate::ops::OpRegistry;

/// A malformed graph definition.
///
/// These are programmer errors in the wiring of a graph. They surface while
/// the graph is being built (at `register` or `finalize`) and are fatal to
/// process-level setup. They can never occur during per-series evaluation.
#[derive(Debug, Error, Diagnostic)]
pub enum DefinitionError {
    #[error("node `{0}` is already registered")]
    #[diagnostic(
        code(cadenza::graph::duplicate_node),
        help("Node names must be unique within a graph definition.")
    )]
    DuplicateNode(String),

    #[error("node `{node}` references unregistered operation `{op}`")]
    #[diagnostic(code(cadenza::graph::unknown_operation))]
    UnknownOperation { node: String, op: String },

    #[error("node `{node}` references unknown node `{dependency}`")]
    #[diagnostic(
        code(cadenza::graph::unknown_dependency),
        help("Dependencies must be registered before their dependents; forward references are rejected, which also rules out cycles.")
    )]
    UnknownDependency { node: String, dependency: String },

    #[error("node `{node}` references undeclared raw input `{input}`")]
    #[diagnostic(code(cadenza::graph::unknown_input))]
    UnknownInput { node: String, input: String },

    #[error("node `{node}` depends on itself")]
    #[diagnostic(code(cadenza::graph::self_reference))]
    SelfReference { node: String },

    #[error("dependency cycle detected involving node `{node}`")]
    #[diagnostic(code(cadenza::graph::cycle))]
    Cycle { node: String },
}

/// Builder for [`GraphDefinition`]s.
///
/// Nodes are registered against an [`OpRegistry`]; every reference is checked
/// as it is added. Because a node may only reference already-registered nodes,
/// the accumulated structure is acyclic by construction; `finalize` still runs
/// a full Kahn pass as the authoritative validation before freezing.
///
/// # Examples
///
/// ```
/// use cadenza::graph::{ArgSpec, GraphBuilder};
/// use cadenza::ops::{expect_arity, ComputeError, OpRegistry};
/// use cadenza::value::Value;
///
/// fn series_len(args: &[Value]) -> Result<Value, ComputeError> {
///     expect_arity(args, 1)?;
///     Ok(Value::Int(args[0].as_series()?.len() as i64))
/// }
///
/// let mut ops = OpRegistry::new();
/// ops.register("len", series_len);
///
/// let graph = GraphBuilder::new(ops)
///     .with_inputs(["t", "m", "e"])
///     .register("n_epochs", "len", vec![ArgSpec::input("t")])
///     .and_then(|b| b.finalize())
///     .unwrap();
/// assert!(graph.contains("n_epochs"));
/// ```
#[derive(Debug)]
pub struct GraphBuilder {
    ops: OpRegistry,
    inputs: Vec<String>,
    nodes: FxHashMap<String, NodeSpec>,
    registration_order: Vec<String>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(ops: OpRegistry) -> Self {
        Self {
            ops,
            inputs: Vec::new(),
            nodes: FxHashMap::default(),
            registration_order: Vec::new(),
        }
    }

    /// Declare the raw-input names nodes may reference.
    #[must_use]
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Register a public (requestable) node.
    pub fn register(
        self,
        name: impl Into<String>,
        op_name: impl Into<String>,
        args: Vec<ArgSpec>,
    ) -> Result<Self, DefinitionError> {
        self.register_with(name, op_name, args, Visibility::Public)
    }

    /// Register an internal node: a valid dependency, never a valid request.
    pub fn register_internal(
        self,
        name: impl Into<String>,
        op_name: impl Into<String>,
        args: Vec<ArgSpec>,
    ) -> Result<Self, DefinitionError> {
        self.register_with(name, op_name, args, Visibility::Internal)
    }

    fn register_with(
        mut self,
        name: impl Into<String>,
        op_name: impl Into<String>,
        args: Vec<ArgSpec>,
        visibility: Visibility,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let op_name = op_name.into();

        if self.nodes.contains_key(&name) {
            return Err(DefinitionError::DuplicateNode(name));
        }
        let op = self
            .ops
            .get(&op_name)
            .ok_or_else(|| DefinitionError::UnknownOperation {
                node: name.clone(),
                op: op_name.clone(),
            })?;

        for arg in &args {
            match arg {
                ArgSpec::Literal(_) => {}
                ArgSpec::Input(input) => {
                    if !self.inputs.iter().any(|declared| declared == input) {
                        return Err(DefinitionError::UnknownInput {
                            node: name,
                            input: input.clone(),
                        });
                    }
                }
                ArgSpec::Node(dependency) => {
                    if dependency == &name {
                        return Err(DefinitionError::SelfReference { node: name });
                    }
                    // Only backward references are accepted, so a cycle can
                    // never be closed here.
                    if !self.nodes.contains_key(dependency) {
                        return Err(DefinitionError::UnknownDependency {
                            node: name,
                            dependency: dependency.clone(),
                        });
                    }
                }
            }
        }

        tracing::trace!(node = %name, op = %op_name, args = args.len(), "registered graph node");
        self.registration_order.push(name.clone());
        self.nodes.insert(
            name.clone(),
            NodeSpec {
                name,
                op_name,
                op,
                args,
                visibility,
            },
        );
        Ok(self)
    }

    /// Validate the accumulated structure and freeze it.
    ///
    /// Runs Kahn's algorithm over the dependency edges as the authoritative
    /// acyclicity check and records the resulting deterministic topological
    /// order on the definition.
    pub fn finalize(self) -> Result<GraphDefinition, DefinitionError> {
        let order = kahn_order(&self.nodes)?;
        tracing::debug!(
            nodes = self.nodes.len(),
            inputs = self.inputs.len(),
            "graph definition finalized"
        );
        Ok(GraphDefinition {
            nodes: self.nodes,
            inputs: self.inputs,
            order,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Kahn's algorithm over dependency edges (dependency -> dependent).
///
/// Ties are broken lexicographically so the ordering is stable across runs.
/// Returns `Cycle` naming one member if the graph cannot be fully ordered.
fn kahn_order(nodes: &FxHashMap<String, NodeSpec>) -> Result<Vec<String>, DefinitionError> {
    let mut in_degree: FxHashMap<&str, usize> = FxHashMap::default();
    let mut dependents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();

    for node in nodes.values() {
        in_degree.entry(node.name.as_str()).or_insert(0);
        for dep in node.dependencies() {
            *in_degree.entry(node.name.as_str()).or_insert(0) += 1;
            dependents.entry(dep).or_default().push(node.name.as_str());
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    ready.sort_unstable();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(name) = ready.first().copied() {
        ready.remove(0);
        order.push(name.to_string());
        if let Some(deps) = dependents.get(name) {
            let mut newly_ready: Vec<&str> = Vec::new();
            for dependent in deps {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        newly_ready.push(dependent);
                    }
                }
            }
            newly_ready.sort_unstable();
            // Merge while keeping the ready list sorted.
            for name in newly_ready {
                let pos = ready.partition_point(|existing| *existing < name);
                ready.insert(pos, name);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck = nodes
            .keys()
            .find(|name| !order.iter().any(|ordered| ordered == *name))
            .cloned()
            .unwrap_or_default();
        return Err(DefinitionError::Cycle { node: stuck });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{expect_arity, ComputeError};
    use crate::value::Value;

    fn identity(args: &[Value]) -> Result<Value, ComputeError> {
        expect_arity(args, 1)?;
        Ok(args[0].clone())
    }

    fn test_ops() -> OpRegistry {
        let mut ops = OpRegistry::new();
        ops.register("identity", identity);
        ops
    }

    #[test]
    fn rejects_duplicate_names() {
        let builder = GraphBuilder::new(test_ops())
            .with_inputs(["t"])
            .register("a", "identity", vec![ArgSpec::input("t")])
            .unwrap();
        let err = builder
            .register("a", "identity", vec![ArgSpec::input("t")])
            .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn rejects_forward_references() {
        let err = GraphBuilder::new(test_ops())
            .with_inputs(["t"])
            .register("a", "identity", vec![ArgSpec::node("b")])
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_self_reference() {
        let err = GraphBuilder::new(test_ops())
            .with_inputs(["t"])
            .register("a", "identity", vec![ArgSpec::node("a")])
            .unwrap_err();
        assert!(matches!(err, DefinitionError::SelfReference { node } if node == "a"));
    }

    #[test]
    fn finalize_orders_dependencies_first() {
        let graph = GraphBuilder::new(test_ops())
            .with_inputs(["t"])
            .register("base", "identity", vec![ArgSpec::input("t")])
            .and_then(|b| b.register("mid", "identity", vec![ArgSpec::node("base")]))
            .and_then(|b| b.register("top", "identity", vec![ArgSpec::node("mid")]))
            .and_then(|b| b.finalize())
            .unwrap();

        let order: Vec<&str> = graph.node_names().collect();
        let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(pos("base") < pos("mid"));
        assert!(pos("mid") < pos("top"));
    }

    #[test]
    fn topological_order_is_deterministic() {
        let build = || {
            GraphBuilder::new(test_ops())
                .with_inputs(["t"])
                .register("z", "identity", vec![ArgSpec::input("t")])
                .and_then(|b| b.register("a", "identity", vec![ArgSpec::input("t")]))
                .and_then(|b| b.register("m", "identity", vec![ArgSpec::input("t")]))
                .and_then(|b| b.finalize())
                .unwrap()
        };
        let first: Vec<String> = build().node_names().map(str::to_string).collect();
        let second: Vec<String> = build().node_names().map(str::to_string).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "m", "z"]);
    }
}
