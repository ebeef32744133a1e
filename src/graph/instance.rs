//! Binding raw inputs to a definition: the per-series [`GraphInstance`].

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::spec::GraphDefinition;
use crate::value::Value;

/// Malformed raw inputs for one evaluation.
///
/// Fatal for that evaluation call only; the shared [`GraphDefinition`] is
/// unaffected.
#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("raw input `{0}` is empty")]
    #[diagnostic(code(cadenza::input::empty_sequence))]
    EmptySequence(String),

    #[error("raw input lengths differ: `{first}` has {first_len} points, `{second}` has {second_len}")]
    #[diagnostic(
        code(cadenza::input::length_mismatch),
        help("Time, value, and error sequences must describe the same observations.")
    )]
    LengthMismatch {
        first: String,
        first_len: usize,
        second: String,
        second_len: usize,
    },

    #[error("raw input `{0}` required by the graph was not supplied")]
    #[diagnostic(code(cadenza::input::missing_binding))]
    MissingBinding(String),
}

/// One observed time series: time, value, and per-point error estimate.
///
/// The three sequences must be non-empty and of equal length. Time is
/// expected non-decreasing; callers validate that, the engine does not.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    pub time: Arc<[f64]>,
    pub value: Arc<[f64]>,
    pub error: Arc<[f64]>,
}

impl TimeSeries {
    pub fn new(time: Vec<f64>, value: Vec<f64>, error: Vec<f64>) -> Result<Self, InputError> {
        if time.is_empty() {
            return Err(InputError::EmptySequence("t".to_string()));
        }
        for (name, len) in [("m", value.len()), ("e", error.len())] {
            if len != time.len() {
                return Err(InputError::LengthMismatch {
                    first: "t".to_string(),
                    first_len: time.len(),
                    second: name.to_string(),
                    second_len: len,
                });
            }
        }
        Ok(Self {
            time: time.into(),
            value: value.into(),
            error: error.into(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Raw-input bindings keyed by declared input name.
#[derive(Clone, Debug, Default)]
pub struct RawInputs {
    values: FxHashMap<String, Value>,
}

impl RawInputs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a numeric series under `name`.
    #[must_use]
    pub fn with_series(mut self, name: impl Into<String>, series: impl Into<Arc<[f64]>>) -> Self {
        self.values.insert(name.into(), Value::Series(series.into()));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

impl From<TimeSeries> for RawInputs {
    fn from(series: TimeSeries) -> Self {
        RawInputs::new()
            .with_series("t", series.time)
            .with_series("m", series.value)
            .with_series("e", series.error)
    }
}

/// A definition with raw inputs bound: the unit passed to the evaluator.
///
/// Created fresh per input series, discarded after evaluation, never mutated.
#[derive(Clone, Debug)]
pub struct GraphInstance {
    definition: Arc<GraphDefinition>,
    inputs: RawInputs,
}

impl GraphInstance {
    #[must_use]
    pub fn definition(&self) -> &GraphDefinition {
        &self.definition
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }
}

impl GraphDefinition {
    /// Bind concrete raw inputs, validating them against the definition.
    ///
    /// Fails if any raw input referenced by a node is absent, any bound
    /// series is empty, or the bound series have unequal lengths. No
    /// operation is executed.
    pub fn bind(self: &Arc<Self>, inputs: RawInputs) -> Result<GraphInstance, InputError> {
        for input in self.referenced_inputs() {
            match inputs.get(input) {
                None => return Err(InputError::MissingBinding(input.to_string())),
                Some(Value::Series(series)) if series.is_empty() => {
                    return Err(InputError::EmptySequence(input.to_string()));
                }
                Some(_) => {}
            }
        }

        let mut bound_series: Option<(&str, usize)> = None;
        for input in self.declared_inputs() {
            if let Some(Value::Series(series)) = inputs.get(input) {
                match bound_series {
                    None => bound_series = Some((input, series.len())),
                    Some((first, first_len)) if first_len != series.len() => {
                        return Err(InputError::LengthMismatch {
                            first: first.to_string(),
                            first_len,
                            second: input.to_string(),
                            second_len: series.len(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(GraphInstance {
            definition: Arc::clone(self),
            inputs,
        })
    }

    /// Convenience binding for the standard `t`/`m`/`e` input layout.
    pub fn bind_series(self: &Arc<Self>, series: TimeSeries) -> Result<GraphInstance, InputError> {
        self.bind(series.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ArgSpec, GraphBuilder};
    use crate::ops::{expect_arity, ComputeError, OpRegistry};

    fn identity(args: &[Value]) -> Result<Value, ComputeError> {
        expect_arity(args, 1)?;
        Ok(args[0].clone())
    }

    fn small_graph() -> Arc<GraphDefinition> {
        let mut ops = OpRegistry::new();
        ops.register("identity", identity);
        Arc::new(
            GraphBuilder::new(ops)
                .with_inputs(["t", "m", "e"])
                .register("times", "identity", vec![ArgSpec::input("t")])
                .and_then(|b| b.finalize())
                .unwrap(),
        )
    }

    #[test]
    fn time_series_rejects_mismatched_lengths() {
        let err = TimeSeries::new(vec![0.0, 1.0], vec![1.0], vec![0.1, 0.1]).unwrap_err();
        assert!(matches!(err, InputError::LengthMismatch { .. }));
    }

    #[test]
    fn time_series_rejects_empty() {
        let err = TimeSeries::new(vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, InputError::EmptySequence(_)));
    }

    #[test]
    fn bind_requires_referenced_inputs() {
        let graph = small_graph();
        let err = graph.bind(RawInputs::new()).unwrap_err();
        assert!(matches!(err, InputError::MissingBinding(name) if name == "t"));
    }

    #[test]
    fn bind_accepts_valid_series() {
        let graph = small_graph();
        let series = TimeSeries::new(vec![0.0, 1.0], vec![1.0, 2.0], vec![0.1, 0.1]).unwrap();
        let instance = graph.bind_series(series).unwrap();
        assert!(instance.input("t").is_some());
    }
}
