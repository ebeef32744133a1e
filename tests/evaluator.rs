//! Evaluation semantics: laziness, memoization, failure containment,
//! deadlines, and idempotence, instrumented through counter operations and
//! the event channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadenza::config::EvalConfig;
use cadenza::evaluator::{Evaluator, NodeFailure, RequestError};
use cadenza::events::{self, EvalEventKind};
use cadenza::graph::{ArgSpec, GraphBuilder, GraphDefinition, GraphInstance, TimeSeries};
use cadenza::ops::{expect_arity, ComputeError, OpRegistry};
use cadenza::value::Value;

/// Registry where every operation increments a shared per-name counter.
struct Counters {
    ops: OpRegistry,
    counts: Vec<(String, Arc<AtomicUsize>)>,
}

impl Counters {
    fn new() -> Self {
        Self {
            ops: OpRegistry::new(),
            counts: Vec::new(),
        }
    }

    fn add(&mut self, name: &str) {
        let counter = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&counter);
        self.ops.register(name, move |args: &[Value]| {
            expect_arity(args, 1)?;
            shared.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Float(args[0].as_series()?.iter().sum()))
        });
        self.counts.push((name.to_string(), counter));
    }

    fn add_failing(&mut self, name: &str) {
        let counter = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&counter);
        self.ops.register(name, move |_args: &[Value]| {
            shared.fetch_add(1, Ordering::SeqCst);
            Err(ComputeError::Singular("deliberate failure".to_string()))
        });
        self.counts.push((name.to_string(), counter));
    }

    fn count(&self, name: &str) -> usize {
        self.counts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.load(Ordering::SeqCst))
            .unwrap_or_else(|| panic!("no counter for `{name}`"))
    }
}

fn pass_through(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(args[0].clone())
}

fn sum_two(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    Ok(Value::Float(args[0].as_float()? + args[1].as_float()?))
}

fn bind(definition: GraphDefinition) -> GraphInstance {
    let definition = Arc::new(definition);
    let series = TimeSeries::new(
        vec![0.0, 1.0, 2.0, 3.0],
        vec![1.0, 2.0, 1.5, 1.8],
        vec![0.1, 0.1, 0.1, 0.1],
    )
    .unwrap();
    definition.bind_series(series).unwrap()
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn only_the_dependency_closure_runs() {
    let mut counters = Counters::new();
    counters.add("wanted_op");
    counters.add("unwanted_op");

    let definition = GraphBuilder::new(counters.ops.clone())
        .with_inputs(["t", "m", "e"])
        .register("wanted", "wanted_op", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("unwanted", "unwanted_op", vec![ArgSpec::input("m")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let report = Evaluator::default()
        .evaluate(&bind(definition), &names(&["wanted"]))
        .await
        .unwrap();

    assert_eq!(counters.count("wanted_op"), 1);
    assert_eq!(counters.count("unwanted_op"), 0);
    assert_eq!(report.len(), 1);
    assert!(report.outcome("unwanted").is_none());
}

#[tokio::test]
async fn shared_dependency_runs_exactly_once() {
    let mut counters = Counters::new();
    counters.add("base_op");

    let mut ops = counters.ops.clone();
    ops.register("pass", pass_through);
    ops.register("sum2", sum_two);

    // Diamond: left and right both read base; top reads both.
    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register_internal("base", "base_op", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("left", "pass", vec![ArgSpec::node("base")]))
        .and_then(|b| b.register("right", "pass", vec![ArgSpec::node("base")]))
        .and_then(|b| {
            b.register(
                "top",
                "sum2",
                vec![ArgSpec::node("left"), ArgSpec::node("right")],
            )
        })
        .and_then(|b| b.finalize())
        .unwrap();

    let report = Evaluator::default()
        .evaluate(&bind(definition), &names(&["top", "left", "right"]))
        .await
        .unwrap();

    assert_eq!(counters.count("base_op"), 1);
    assert!(report.outcome("top").unwrap().is_ok());
    // base ran as a dependency and is present in the report.
    assert!(report.outcome("base").unwrap().is_ok());
}

#[tokio::test]
async fn failure_poisons_dependents_but_not_siblings() {
    let mut counters = Counters::new();
    counters.add_failing("bad_op");
    counters.add("dependent_op");

    let mut ops = counters.ops.clone();
    ops.register("pass", pass_through);

    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register_internal("bad", "bad_op", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("downstream", "pass", vec![ArgSpec::node("bad")]))
        .and_then(|b| b.register("further", "pass", vec![ArgSpec::node("downstream")]))
        .and_then(|b| b.register("sibling", "pass", vec![ArgSpec::input("m")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let report = Evaluator::default()
        .evaluate(
            &bind(definition),
            &names(&["downstream", "further", "sibling"]),
        )
        .await
        .unwrap();

    // The poisoned node's own operation failed; its dependents never ran.
    assert_eq!(counters.count("dependent_op"), 0);
    match report.outcome("bad").unwrap() {
        Err(NodeFailure::Computation { .. }) => {}
        other => panic!("expected computation failure, got {other:?}"),
    }
    // Propagation carries the originating node through multiple hops.
    for name in ["downstream", "further"] {
        match report.outcome(name).unwrap() {
            Err(NodeFailure::Propagated { origin, .. }) => assert_eq!(origin, "bad"),
            other => panic!("expected propagated failure for `{name}`, got {other:?}"),
        }
    }
    assert!(report.outcome("sibling").unwrap().is_ok());
}

#[tokio::test]
async fn panicking_operation_fails_its_node_without_aborting_the_run() {
    let mut ops = OpRegistry::new();
    ops.register("pass", pass_through);
    ops.register("explode", |_args: &[Value]| -> Result<Value, ComputeError> {
        panic!("deliberate panic")
    });

    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register("volatile", "explode", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("downstream", "pass", vec![ArgSpec::node("volatile")]))
        .and_then(|b| b.register("sibling", "pass", vec![ArgSpec::input("m")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let report = Evaluator::default()
        .evaluate(
            &bind(definition),
            &names(&["volatile", "downstream", "sibling"]),
        )
        .await
        .unwrap();

    match report.outcome("volatile").unwrap() {
        Err(NodeFailure::Computation {
            source: ComputeError::Panicked(_),
        }) => {}
        other => panic!("expected panic failure, got {other:?}"),
    }
    match report.outcome("downstream").unwrap() {
        Err(NodeFailure::Propagated { origin, .. }) => assert_eq!(origin, "volatile"),
        other => panic!("expected propagated failure, got {other:?}"),
    }
    assert!(report.outcome("sibling").unwrap().is_ok());
}

#[tokio::test]
async fn zero_deadline_times_out_unclaimed_nodes() {
    let mut ops = OpRegistry::new();
    ops.register("pass", pass_through);

    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register("a", "pass", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("b", "pass", vec![ArgSpec::node("a")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let evaluator = Evaluator::new(EvalConfig::new().with_deadline(Duration::ZERO));
    let report = evaluator
        .evaluate(&bind(definition), &names(&["b"]))
        .await
        .unwrap();

    assert!(report.ran.is_empty());
    for name in ["a", "b"] {
        match report.outcome(name).unwrap() {
            Err(NodeFailure::TimedOut) => {}
            other => panic!("expected timeout for `{name}`, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn repeated_evaluation_is_idempotent() {
    let mut counters = Counters::new();
    counters.add("sum_op");

    let definition = GraphBuilder::new(counters.ops.clone())
        .with_inputs(["t", "m", "e"])
        .register("total", "sum_op", vec![ArgSpec::input("m")])
        .and_then(|b| b.finalize())
        .unwrap();

    let instance = bind(definition);
    let evaluator = Evaluator::default();
    let first = evaluator
        .evaluate(&instance, &names(&["total"]))
        .await
        .unwrap();
    let second = evaluator
        .evaluate(&instance, &names(&["total"]))
        .await
        .unwrap();

    // Memoization is per evaluation: each call runs the op once.
    assert_eq!(counters.count("sum_op"), 2);
    assert_ne!(first.run_id, second.run_id);
    let value = |report: &cadenza::evaluator::EvalReport| match report.outcome("total").unwrap() {
        Ok(Value::Float(v)) => *v,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(value(&first), value(&second));
}

#[tokio::test]
async fn events_record_one_claim_per_executed_node() {
    let mut ops = OpRegistry::new();
    ops.register("pass", pass_through);

    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register("a", "pass", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("b", "pass", vec![ArgSpec::node("a")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let (sender, receiver) = events::channel();
    let evaluator = Evaluator::default().with_events(sender);
    let report = evaluator
        .evaluate(&bind(definition), &names(&["b"]))
        .await
        .unwrap();

    let collected: Vec<_> = receiver.drain().collect();
    let claims: Vec<&str> = collected
        .iter()
        .filter(|event| event.kind == EvalEventKind::Claimed)
        .map(|event| event.node.as_str())
        .collect();
    assert_eq!(claims.len(), report.ran.len());
    assert_eq!(claims, vec!["a", "b"]);
    assert!(collected.iter().all(|event| event.run_id == report.run_id));
}

#[tokio::test]
async fn unknown_and_internal_requests_are_rejected() {
    let mut ops = OpRegistry::new();
    ops.register("pass", pass_through);

    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register_internal("hidden", "pass", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("visible", "pass", vec![ArgSpec::node("hidden")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let instance = bind(definition);
    let evaluator = Evaluator::default();

    let err = evaluator
        .evaluate(&instance, &names(&["missing"]))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::UnknownName(name) if name == "missing"));

    let err = evaluator
        .evaluate(&instance, &names(&["hidden"]))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Internal(name) if name == "hidden"));
}

#[tokio::test]
async fn concurrency_of_one_still_completes() {
    let mut ops = OpRegistry::new();
    ops.register("pass", pass_through);

    let definition = GraphBuilder::new(ops)
        .with_inputs(["t", "m", "e"])
        .register("a", "pass", vec![ArgSpec::input("t")])
        .and_then(|b| b.register("b", "pass", vec![ArgSpec::input("m")]))
        .and_then(|b| b.register("c", "pass", vec![ArgSpec::input("e")]))
        .and_then(|b| b.finalize())
        .unwrap();

    let evaluator = Evaluator::new(EvalConfig::new().with_max_concurrency(1));
    let report = evaluator
        .evaluate(&bind(definition), &names(&["a", "b", "c"]))
        .await
        .unwrap();
    assert_eq!(report.ran.len(), 3);
    assert!(report.outcomes().all(|(_, outcome)| outcome.is_ok()));
}

#[test]
fn telemetry_init_is_idempotent() {
    cadenza::telemetry::init();
    cadenza::telemetry::init();
}
