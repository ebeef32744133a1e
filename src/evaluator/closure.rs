//! Dependency-closure computation for lazy evaluation.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::GraphDefinition;

/// The minimal node set that must be resolved for a requested output set,
/// with the bookkeeping the scheduler needs: unresolved-dependency counts,
/// reverse edges, and the initially ready nodes.
///
/// Nodes outside the closure are never touched by the evaluator.
pub(crate) struct Closure {
    pub members: FxHashSet<String>,
    /// Unresolved dependency count per member (within the closure).
    pub pending_deps: FxHashMap<String, usize>,
    /// Reverse edges within the closure: dependency -> dependents.
    pub dependents: FxHashMap<String, Vec<String>>,
    /// Members with no dependencies, sorted for deterministic claim order.
    pub ready: Vec<String>,
}

/// Walk `Node` argument references backward from the requested names.
///
/// Callers have already validated that every requested name exists in the
/// definition, and the definition guarantees every reference resolves, so the
/// walk cannot miss.
pub(crate) fn dependency_closure(definition: &GraphDefinition, requested: &[String]) -> Closure {
    let mut members: FxHashSet<String> = FxHashSet::default();
    let mut stack: Vec<&str> = requested.iter().map(String::as_str).collect();

    while let Some(name) = stack.pop() {
        if !members.insert(name.to_string()) {
            continue;
        }
        let node = definition
            .node(name)
            .expect("closure members are validated against the definition");
        stack.extend(node.dependencies());
    }

    let mut pending_deps: FxHashMap<String, usize> = FxHashMap::default();
    let mut dependents: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for name in &members {
        let node = definition
            .node(name)
            .expect("closure members are validated against the definition");
        let deps = node.dependencies();
        pending_deps.insert(name.clone(), deps.len());
        for dep in deps {
            dependents
                .entry(dep.to_string())
                .or_default()
                .push(name.clone());
        }
    }

    let mut ready: Vec<String> = pending_deps
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| name.clone())
        .collect();
    ready.sort_unstable();

    Closure {
        members,
        pending_deps,
        dependents,
        ready,
    }
}
