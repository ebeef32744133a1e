//! # Cadenza: Lazy Feature Graphs for Time Series
//!
//! Cadenza computes named statistical features of irregularly sampled time
//! series by evaluating a directed acyclic graph of pure operations. Shared
//! intermediates (a cadence series, a fitted periodogram model) are computed
//! once per evaluation no matter how many requested features depend on them,
//! and only the dependency closure of the requested names runs at all.
//!
//! ## Core Concepts
//!
//! - **Operations**: Pure functions from positional [`Value`](value::Value)
//!   arguments to one result, held in an [`OpRegistry`](ops::OpRegistry)
//! - **Graph definition**: Named nodes wiring operations to raw inputs,
//!   literals, and other nodes, validated and frozen by
//!   [`GraphBuilder`](graph::GraphBuilder)
//! - **Instance**: A definition bound to one concrete series (`t`, `m`, `e`)
//! - **Evaluator**: Lazy, memoizing, concurrency-bounded execution with
//!   per-node failure containment
//! - **Catalog**: Category selectors (`"cadence"`, `"all"`, ...) expanding to
//!   concrete feature names
//! - **Extraction**: Projection of an evaluation report to a serializable
//!   feature vector of primitives
//!
//! ## Quick Start
//!
//! ```
//! use cadenza::evaluator::Evaluator;
//! use cadenza::extract::extract;
//! use cadenza::features::standard_graph;
//! use cadenza::graph::TimeSeries;
//! use std::sync::Arc;
//!
//! let definition = Arc::new(standard_graph().unwrap());
//! let series = TimeSeries::new(
//!     vec![0.0, 1.0, 2.0, 3.0],
//!     vec![1.0, 2.0, 1.5, 1.8],
//!     vec![0.1, 0.1, 0.1, 0.1],
//! )
//! .unwrap();
//! let instance = definition.bind_series(series).unwrap();
//!
//! let requested = vec!["n_epochs".to_string(), "mean".to_string()];
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let report = runtime
//!     .block_on(Evaluator::default().evaluate(&instance, &requested))
//!     .unwrap();
//!
//! let features = extract(&definition, &report, &requested).unwrap();
//! assert_eq!(
//!     features.get("n_epochs").unwrap().value(),
//!     Some(&serde_json::json!(4))
//! );
//! let mean = features.get("mean").unwrap().value().unwrap().as_f64().unwrap();
//! assert!((mean - 1.575).abs() < 1e-12);
//! ```
//!
//! ## Selecting by Category
//!
//! ```
//! use cadenza::features::standard_catalog;
//!
//! let catalog = standard_catalog();
//! let names = catalog.expand(["cadence"]).unwrap();
//! assert_eq!(names[0], "n_epochs");
//! ```
//!
//! ## Failure Containment
//!
//! A failing operation poisons only its own node and its transitive
//! dependents; unrelated features requested in the same call still produce
//! values. Short series flow through the engine and fail only in the
//! operations that need more points, so a length-1 series still yields
//! `n_epochs` while its cadence features report failures.
//!
//! ## Module Guide
//!
//! - [`value`] - Values exchanged between nodes
//! - [`ops`] - Operation trait, registry, and compute errors
//! - [`graph`] - Builder, frozen definitions, and per-series instances
//! - [`evaluator`] - Lazy concurrent evaluation
//! - [`catalog`] - Category registry and selector expansion
//! - [`extract`] - Primitive normalization and the feature vector
//! - [`features`] - The built-in astronomy descriptor set
//! - [`events`] - Per-node lifecycle events for instrumentation
//! - [`config`] - Evaluation limits, programmatic or from the environment
//! - [`telemetry`] - Tracing subscriber setup

pub mod catalog;
pub mod config;
pub mod evaluator;
pub mod events;
pub mod extract;
pub mod features;
pub mod graph;
pub mod ops;
pub mod telemetry;
pub mod value;
