//! Result extraction: projecting an [`EvalReport`] to the externally visible
//! feature vector.
//!
//! The evaluator's report contains every node in the closure, internal
//! intermediates included, with engine-level [`Value`]s. Extraction filters
//! to the requested public names and normalizes each value to a serializable
//! primitive in one explicit step: integers become JSON integers, floats
//! become JSON numbers (non-finite floats become `null`, which JSON cannot
//! represent otherwise), and series/opaque values are reported as per-name
//! failures rather than leaking engine types to consumers.

use std::collections::BTreeMap;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluator::{EvalReport, NodeFailure};
use crate::graph::GraphDefinition;
use crate::value::Value;

/// Extraction rejected the request itself (not a per-name failure).
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    /// The name exists but is an internal node.
    #[error("`{0}` is an internal node and cannot be extracted")]
    #[diagnostic(
        code(cadenza::extract::internal_node),
        help("Internal nodes are dependencies only; request the public features derived from them.")
    )]
    Internal(String),

    /// The name is not in the definition or was not part of the evaluation.
    #[error("`{0}` was not evaluated")]
    #[diagnostic(code(cadenza::extract::not_evaluated))]
    NotEvaluated(String),
}

/// Final per-feature outcome: a primitive value or a structured failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureOutcome {
    Ok { value: serde_json::Value },
    Failed { kind: String, message: String },
}

impl FeatureOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, FeatureOutcome::Ok { .. })
    }

    #[must_use]
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            FeatureOutcome::Ok { value } => Some(value),
            FeatureOutcome::Failed { .. } => None,
        }
    }
}

/// The externally visible result of one evaluation: requested feature names
/// mapped to primitive values or failure markers. Ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: BTreeMap<String, FeatureOutcome>,
}

impl FeatureVector {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FeatureOutcome> {
        self.features.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Project `requested` public names out of a terminal report.
///
/// Internal names are rejected structurally (by the node's visibility flag,
/// not a naming convention). Per-node evaluation failures become per-name
/// failure markers; they never abort extraction of the other names.
pub fn extract(
    definition: &GraphDefinition,
    report: &EvalReport,
    requested: &[String],
) -> Result<FeatureVector, ExtractError> {
    let mut features = BTreeMap::new();
    for name in requested {
        let node = definition
            .node(name)
            .ok_or_else(|| ExtractError::NotEvaluated(name.clone()))?;
        if !node.is_public() {
            return Err(ExtractError::Internal(name.clone()));
        }
        let outcome = report
            .outcome(name)
            .ok_or_else(|| ExtractError::NotEvaluated(name.clone()))?;
        features.insert(name.clone(), normalize_outcome(outcome));
    }
    Ok(FeatureVector { features })
}

fn normalize_outcome(outcome: &Result<Value, NodeFailure>) -> FeatureOutcome {
    match outcome {
        Ok(value) => match normalize_value(value) {
            Some(json) => FeatureOutcome::Ok { value: json },
            None => FeatureOutcome::Failed {
                kind: "non_primitive".to_string(),
                message: format!("value of kind `{}` has no primitive representation", value.kind()),
            },
        },
        Err(failure) => FeatureOutcome::Failed {
            kind: failure.kind().to_string(),
            message: failure.to_string(),
        },
    }
}

/// The single primitive-normalization step.
///
/// Returns `None` for values that must not cross the boundary (series and
/// opaque intermediates).
fn normalize_value(value: &Value) -> Option<serde_json::Value> {
    if !value.is_primitive() {
        return None;
    }
    match value {
        Value::Float(v) => Some(
            serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        ),
        Value::Int(v) => Some(serde_json::Value::from(*v)),
        Value::Bool(v) => Some(serde_json::Value::from(*v)),
        Value::Str(v) => Some(serde_json::Value::from(v.clone())),
        Value::Series(_) | Value::Opaque(_) => unreachable!("filtered by is_primitive"),
    }
}
