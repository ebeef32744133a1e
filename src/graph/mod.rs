//! Graph definition, validation, and per-series instantiation.
//!
//! A graph is built in three stages:
//!
//! 1. [`GraphBuilder`] accumulates named node specifications. Every argument
//!    reference (raw input or other node) is validated at registration time,
//!    so a malformed graph is a setup-time [`DefinitionError`], never an
//!    evaluation-time surprise.
//! 2. [`GraphBuilder::finalize`] runs a full topological-sort validation pass
//!    and freezes the structure into an immutable [`GraphDefinition`].
//! 3. [`GraphDefinition::bind`] attaches one time series' raw inputs,
//!    producing a [`GraphInstance`], the unit handed to the evaluator.
//!
//! Definitions are shared (via `Arc`) across every series evaluated against
//! them; instances are created fresh per series and never mutated.

mod builder;
mod instance;
mod spec;

pub use builder::{DefinitionError, GraphBuilder};
pub use instance::{GraphInstance, InputError, RawInputs, TimeSeries};
pub use spec::{ArgSpec, GraphDefinition, NodeSpec, Visibility};
