//! Damped-random-walk ("QSO") variability fit.
//!
//! Each observation is predicted from its predecessor under an exponentially
//! decorrelating process, and the resulting chi-square per degree of freedom
//! is compared against the null hypothesis of a constant source. Quasar-like
//! variability shows a low QSO chi-square and a high null-to-QSO ratio.

use std::any::Any;

use super::stats::{require_len, variance};
use crate::ops::{expect_arity, ComputeError};
use crate::value::{OpaqueValue, Value};

/// Fraction of the observed time span used as the decorrelation timescale.
const TAU_FRACTION: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct QsoModel {
    pub log_chi2_qsonu: f64,
    pub log_chi2nu_null_chi2nu: f64,
}

impl OpaqueValue for QsoModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fit the damped-random-walk model to `(t, m, e)`.
pub fn qso_fit(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let t = args[0].as_series()?;
    let m = args[1].as_series()?;
    let e = args[2].as_series()?;
    require_len(m, 2)?;
    if t.len() != m.len() || e.len() != m.len() {
        return Err(ComputeError::Singular(
            "input series differ in length".to_string(),
        ));
    }
    if e.iter().any(|&ei| ei <= 0.0) {
        return Err(ComputeError::Singular(
            "non-positive measurement error".to_string(),
        ));
    }

    let span = t[t.len() - 1] - t[0];
    if span <= 0.0 {
        return Err(ComputeError::Singular("zero time span".to_string()));
    }
    let tau = span * TAU_FRACTION;

    // Weighted mean under the null (constant-source) hypothesis.
    let mut weight_sum = 0.0;
    let mut weighted = 0.0;
    for (&mi, &ei) in m.iter().zip(e) {
        let w = 1.0 / (ei * ei);
        weight_sum += w;
        weighted += w * mi;
    }
    let mu = weighted / weight_sum;

    let nu = (m.len() - 1) as f64;
    let chi2_null: f64 = m
        .iter()
        .zip(e)
        .map(|(&mi, &ei)| {
            let r = (mi - mu) / ei;
            r * r
        })
        .sum();

    let process_var = variance(m);
    let mut chi2_qso = 0.0;
    for i in 1..m.len() {
        let dt = (t[i] - t[i - 1]).max(0.0);
        let decay = (-dt / tau).exp();
        let predicted = mu + (m[i - 1] - mu) * decay;
        let var = e[i] * e[i] + process_var * (1.0 - decay * decay);
        chi2_qso += (m[i] - predicted).powi(2) / var;
    }
    if chi2_qso <= 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }

    Ok(Value::opaque(QsoModel {
        log_chi2_qsonu: (chi2_qso / nu).ln(),
        log_chi2nu_null_chi2nu: (chi2_null / chi2_qso).ln(),
    }))
}

/// Log chi-square per degree of freedom under the QSO model.
pub fn qso_log_chi2_qsonu(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<QsoModel>()?.log_chi2_qsonu,
    ))
}

/// Log ratio of the null model's chi-square per dof over the QSO model's.
pub fn qso_log_chi2nu_null_chi2nu(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<QsoModel>()?.log_chi2nu_null_chi2nu,
    ))
}
