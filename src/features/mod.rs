//! The built-in feature library: operations, standard graph, and catalog.
//!
//! The engine itself is agnostic to what its operations compute. This module
//! supplies the standard astronomy descriptor set (cadence statistics,
//! general light-curve statistics, the damped-random-walk variability fit,
//! and periodogram-derived features) wired
//! into a single [`GraphDefinition`](crate::graph::GraphDefinition) over the
//! raw inputs `t` (time, days), `m` (magnitude/flux), and `e` (per-point
//! error).
//!
//! Entry points:
//! - [`standard_ops`]: the operation registry backing the standard graph
//! - [`standard_graph`]: the wired feature graph
//! - [`standard_catalog`]: category/tag metadata for selection

pub mod cadence;
pub mod general;
pub mod periodic;
pub mod qso;

mod catalog;
mod graph;
mod stats;

pub use catalog::standard_catalog;
pub use graph::{standard_graph, standard_ops};
