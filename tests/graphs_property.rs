//! Structural properties of evaluation over randomly generated layered DAGs:
//! every node in the dependency closure of a request runs exactly once, and
//! nothing outside the closure runs at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use cadenza::evaluator::Evaluator;
use cadenza::graph::{ArgSpec, GraphBuilder, TimeSeries};
use cadenza::ops::{ComputeError, OpRegistry};
use cadenza::value::Value;

/// Edges `deps[i]` (all `< i`) make earlier nodes dependencies of node `i`,
/// so the generated graph is acyclic by construction.
#[derive(Debug, Clone)]
struct LayeredDag {
    deps: Vec<Vec<usize>>,
    requested: Vec<usize>,
}

fn layered_dag() -> impl Strategy<Value = LayeredDag> {
    (2usize..10).prop_flat_map(|n| {
        let edges = proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n);
        let mask = proptest::collection::vec(any::<bool>(), n);
        (edges, mask).prop_map(move |(edges, mask)| {
            let deps: Vec<Vec<usize>> = (0..n)
                .map(|i| (0..i).filter(|&j| edges[i][j]).collect())
                .collect();
            let mut requested: Vec<usize> = (0..n).filter(|&i| mask[i]).collect();
            if requested.is_empty() {
                requested.push(n - 1);
            }
            LayeredDag { deps, requested }
        })
    })
}

/// Transitive closure of the requested set over the dependency edges.
fn expected_closure(dag: &LayeredDag) -> Vec<bool> {
    let mut member = vec![false; dag.deps.len()];
    let mut stack: Vec<usize> = dag.requested.clone();
    while let Some(i) = stack.pop() {
        if member[i] {
            continue;
        }
        member[i] = true;
        stack.extend(&dag.deps[i]);
    }
    member
}

proptest! {
    #[test]
    fn closure_members_run_exactly_once(dag in layered_dag()) {
        let n = dag.deps.len();
        let mut ops = OpRegistry::new();
        let counters: Vec<Arc<AtomicUsize>> =
            (0..n).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        for (i, counter) in counters.iter().enumerate() {
            let counter = Arc::clone(counter);
            ops.register(format!("op_{i}"), move |_args: &[Value]| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<Value, ComputeError>(Value::Float(1.0))
            });
        }

        let mut builder = GraphBuilder::new(ops).with_inputs(["t", "m", "e"]);
        for (i, deps) in dag.deps.iter().enumerate() {
            let args = if deps.is_empty() {
                vec![ArgSpec::input("t")]
            } else {
                deps.iter().map(|j| ArgSpec::node(format!("node_{j}"))).collect()
            };
            builder = builder
                .register(format!("node_{i}"), format!("op_{i}"), args)
                .unwrap();
        }
        let definition = Arc::new(builder.finalize().unwrap());

        let series = TimeSeries::new(vec![0.0, 1.0], vec![1.0, 2.0], vec![0.1, 0.1]).unwrap();
        let instance = definition.bind_series(series).unwrap();
        let requested: Vec<String> =
            dag.requested.iter().map(|i| format!("node_{i}")).collect();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = runtime
            .block_on(Evaluator::default().evaluate(&instance, &requested))
            .unwrap();

        let member = expected_closure(&dag);
        for (i, counter) in counters.iter().enumerate() {
            let runs = counter.load(Ordering::SeqCst);
            let name = format!("node_{i}");
            if member[i] {
                prop_assert_eq!(runs, 1, "node_{} should run exactly once", i);
                prop_assert!(report.outcome(&name).unwrap().is_ok());
            } else {
                prop_assert_eq!(runs, 0, "node_{} is outside the closure", i);
                prop_assert!(report.outcome(&name).is_none());
            }
        }
        prop_assert_eq!(report.ran.len(), member.iter().filter(|m| **m).count());
    }
}
