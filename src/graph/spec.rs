//! Static graph structure: argument sources, node specifications, and the
//! frozen definition produced by [`GraphBuilder::finalize`](super::GraphBuilder::finalize).

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ops::Operation;
use crate::value::Value;

/// Whether a node may be requested directly or only used as a dependency.
///
/// Internal nodes carry shared intermediates (a diff series, a fitted model).
/// They are valid dependencies but are rejected if named in a request, and the
/// extractor never surfaces them. This is a structural flag, not a naming
/// convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
}

/// Source of one positional argument for a node's operation.
///
/// Order matters: arguments are passed to the operation in spec order.
#[derive(Clone, Debug)]
pub enum ArgSpec {
    /// A constant baked into the graph definition.
    Literal(Value),
    /// A declared raw input, bound per evaluation (e.g. `t`, `m`, `e`).
    Input(String),
    /// The terminal value of another node in the same graph.
    Node(String),
}

impl ArgSpec {
    pub fn literal(value: impl Into<Value>) -> Self {
        ArgSpec::Literal(value.into())
    }

    pub fn input(name: impl Into<String>) -> Self {
        ArgSpec::Input(name.into())
    }

    pub fn node(name: impl Into<String>) -> Self {
        ArgSpec::Node(name.into())
    }
}

/// A named computation step: one operation plus its argument sources.
#[derive(Clone)]
pub struct NodeSpec {
    pub name: String,
    pub op_name: String,
    pub(crate) op: Arc<dyn Operation>,
    pub args: Vec<ArgSpec>,
    pub visibility: Visibility,
}

impl NodeSpec {
    /// Names of the nodes this node depends on, de-duplicated.
    ///
    /// A node may consume the same dependency in more than one argument slot;
    /// for scheduling purposes that is a single edge.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();
        let mut deps = Vec::new();
        for arg in &self.args {
            if let ArgSpec::Node(name) = arg {
                if seen.insert(name.as_str()) {
                    deps.push(name.as_str());
                }
            }
        }
        deps
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("op", &self.op_name)
            .field("args", &self.args)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// An immutable, validated collection of named nodes.
///
/// Invariants established at [`finalize`](super::GraphBuilder::finalize) time:
/// every node reference resolves within the definition, every input reference
/// is declared, and the dependency graph is acyclic. `order` holds a
/// deterministic topological ordering (dependencies first, lexicographic
/// tie-break) used for stable iteration.
#[derive(Clone, Debug)]
pub struct GraphDefinition {
    pub(crate) nodes: FxHashMap<String, NodeSpec>,
    pub(crate) inputs: Vec<String>,
    pub(crate) order: Vec<String>,
}

impl GraphDefinition {
    /// Look up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in deterministic topological order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Names of all public (requestable) nodes, in topological order.
    pub fn public_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(String::as_str)
            .filter(|name| {
                self.nodes
                    .get(*name)
                    .is_some_and(|node| node.is_public())
            })
            .collect()
    }

    /// Raw-input names declared for this graph.
    #[must_use]
    pub fn declared_inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Raw-input names actually referenced by at least one node.
    pub(crate) fn referenced_inputs(&self) -> FxHashSet<&str> {
        let mut used = FxHashSet::default();
        for node in self.nodes.values() {
            for arg in &node.args {
                if let ArgSpec::Input(name) = arg {
                    used.insert(name.as_str());
                }
            }
        }
        used
    }
}
