//! Values exchanged between graph nodes.
//!
//! Everything that flows along a graph edge is a [`Value`]: raw-input series,
//! literal constants baked into the graph, scalar feature results, and the
//! opaque intermediates (fitted models, peak lists) that several downstream
//! nodes share. Series and opaques are reference counted so that fan-out to
//! many dependents never copies the underlying data.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ops::ComputeError;

/// Marker trait for opaque intermediate results.
///
/// Opaque values travel freely between nodes but are rejected at the
/// extraction boundary; external consumers only ever see primitive scalars.
pub trait OpaqueValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

/// A value produced by an operation or supplied as a raw input / literal.
#[derive(Clone, Debug)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    /// Shared, immutable numeric sequence (raw inputs, diffs, histograms).
    Series(Arc<[f64]>),
    /// Opaque intermediate, e.g. a fitted periodogram model.
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Wrap a numeric sequence as a shared series.
    pub fn series(values: impl Into<Arc<[f64]>>) -> Self {
        Value::Series(values.into())
    }

    /// Wrap an opaque intermediate result.
    pub fn opaque<T: OpaqueValue>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Short label for diagnostics and type-mismatch errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Series(_) => "series",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Read this value as a float, widening integers.
    pub fn as_float(&self) -> Result<f64, ComputeError> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(ComputeError::TypeMismatch {
                expected: "float",
                found: other.kind(),
            }),
        }
    }

    /// Read this value as an integer.
    pub fn as_int(&self) -> Result<i64, ComputeError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(ComputeError::TypeMismatch {
                expected: "int",
                found: other.kind(),
            }),
        }
    }

    /// Borrow this value as a numeric series.
    pub fn as_series(&self) -> Result<&[f64], ComputeError> {
        match self {
            Value::Series(v) => Ok(v),
            other => Err(ComputeError::TypeMismatch {
                expected: "series",
                found: other.kind(),
            }),
        }
    }

    /// Downcast an opaque value to a concrete intermediate type.
    pub fn downcast_opaque<T: OpaqueValue>(&self) -> Result<&T, ComputeError> {
        match self {
            Value::Opaque(v) => {
                v.as_any()
                    .downcast_ref::<T>()
                    .ok_or(ComputeError::TypeMismatch {
                        expected: std::any::type_name::<T>(),
                        found: "opaque",
                    })
            }
            other => Err(ComputeError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: other.kind(),
            }),
        }
    }

    /// Whether this value survives the primitive-normalization boundary.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Float(_) | Value::Int(_) | Value::Bool(_) | Value::Str(_)
        )
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Series(v.into())
    }
}
