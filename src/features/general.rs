//! General light-curve statistics over the value series `m` (and, for the
//! weighted variants, the per-point errors `e`).

use super::stats::{
    diff, mad, max_value, mean, median, min_value, percentile, require_len, std, variance,
};
use crate::ops::{expect_arity, ComputeError};
use crate::value::Value;

pub fn maximum(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    Ok(Value::Float(max_value(m)))
}

pub fn minimum(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    Ok(Value::Float(min_value(m)))
}

/// Half the peak-to-peak range.
pub fn amplitude(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    Ok(Value::Float((max_value(m) - min_value(m)) / 2.0))
}

/// Largest deviation from the median, as a fraction of the median.
pub fn percent_amplitude(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    let med = median(m);
    if med == 0.0 {
        return Err(ComputeError::Singular("median is zero".to_string()));
    }
    let largest = m
        .iter()
        .map(|x| (x - med).abs())
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(Value::Float(largest / med.abs()))
}

/// `(P(50 + mid/2) - P(50 - mid/2)) / (P95 - P5)` for a literal `mid` width.
pub fn flux_percentile_ratio(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    let mid = args[1].as_float()?;
    let numerator = percentile(m, 50.0 + mid / 2.0) - percentile(m, 50.0 - mid / 2.0);
    let denominator = percentile(m, 95.0) - percentile(m, 5.0);
    if denominator == 0.0 {
        return Err(ComputeError::Singular(
            "5th and 95th percentiles coincide".to_string(),
        ));
    }
    Ok(Value::Float(numerator / denominator))
}

/// `(P95 - P5) / median`.
pub fn percent_difference_flux_percentile(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    let med = median(m);
    if med == 0.0 {
        return Err(ComputeError::Singular("median is zero".to_string()));
    }
    Ok(Value::Float(
        (percentile(m, 95.0) - percentile(m, 5.0)) / med.abs(),
    ))
}

/// Largest absolute slope between consecutive observations.
pub fn max_slope(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let t = args[0].as_series()?;
    let m = args[1].as_series()?;
    require_len(t, 2)?;
    if t.len() != m.len() {
        return Err(ComputeError::Singular(
            "time and value series differ in length".to_string(),
        ));
    }
    let dt = diff(t);
    let dm = diff(m);
    let mut best = f64::NEG_INFINITY;
    for (dm_i, dt_i) in dm.iter().zip(&dt) {
        if *dt_i != 0.0 {
            best = best.max((dm_i / dt_i).abs());
        }
    }
    if best == f64::NEG_INFINITY {
        return Err(ComputeError::Singular(
            "all time steps are zero".to_string(),
        ));
    }
    Ok(Value::Float(best))
}

pub fn median_of(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    Ok(Value::Float(median(m)))
}

pub fn median_absolute_deviation(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    Ok(Value::Float(mad(m)))
}

/// Fraction of points farther than one weighted standard deviation from the
/// error-weighted mean. Weights are `1 / e^2`.
pub fn percent_beyond_1_std(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let m = args[0].as_series()?;
    let e = args[1].as_series()?;
    require_len(m, 1)?;
    let center = weighted_mean(m, e)?;
    let spread = std(m);
    let beyond = m.iter().filter(|&&x| (x - center).abs() > spread).count();
    Ok(Value::Float(beyond as f64 / m.len() as f64))
}

/// Fraction of points within a tenth of the value range of the median.
pub fn percent_close_to_median(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    let window = 0.1 * (max_value(m) - min_value(m));
    let med = median(m);
    let close = m.iter().filter(|&&x| (x - med).abs() < window).count();
    Ok(Value::Float(close as f64 / m.len() as f64))
}

/// Sample skewness, `g1 = m3 / m2^(3/2)`.
pub fn skew(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 2)?;
    let mu = mean(m);
    let m2 = m.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / m.len() as f64;
    let m3 = m.iter().map(|x| (x - mu).powi(3)).sum::<f64>() / m.len() as f64;
    if m2 == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }
    Ok(Value::Float(m3 / m2.powf(1.5)))
}

/// Inverse-variance weighted mean of `m` given per-point errors `e`.
pub fn weighted_average(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let m = args[0].as_series()?;
    let e = args[1].as_series()?;
    require_len(m, 1)?;
    Ok(Value::Float(weighted_mean(m, e)?))
}

/// Stetson's J robust variability index, computed over consecutive pairs
/// scaled by the series standard deviation.
pub fn stetson_j(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 2)?;
    let n = m.len() as f64;
    let mu = mean(m);
    let sigma = std(m);
    if sigma == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }
    let scale = (n / (n - 1.0)).sqrt() / sigma;
    let j: f64 = m
        .windows(2)
        .map(|w| {
            let p = scale * (w[0] - mu) * scale * (w[1] - mu);
            p.signum() * p.abs().sqrt()
        })
        .sum::<f64>()
        / (n - 1.0);
    Ok(Value::Float(j))
}

/// Stetson's K kurtosis-like index: mean absolute deviation over RMS
/// deviation, both about the mean.
pub fn stetson_k(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let m = args[0].as_series()?;
    require_len(m, 1)?;
    let mu = mean(m);
    let rms = variance(m).sqrt();
    if rms == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }
    let abs_mean = m.iter().map(|x| (x - mu).abs()).sum::<f64>() / m.len() as f64;
    Ok(Value::Float(abs_mean / rms))
}

fn weighted_mean(m: &[f64], e: &[f64]) -> Result<f64, ComputeError> {
    if m.len() != e.len() {
        return Err(ComputeError::Singular(
            "value and error series differ in length".to_string(),
        ));
    }
    let mut weight_sum = 0.0;
    let mut weighted = 0.0;
    for (x, err) in m.iter().zip(e) {
        if *err == 0.0 {
            return Err(ComputeError::Singular(
                "zero error gives infinite weight".to_string(),
            ));
        }
        let w = 1.0 / (err * err);
        weight_sum += w;
        weighted += w * x;
    }
    Ok(weighted / weight_sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(value: Value) -> f64 {
        match value {
            Value::Float(v) => v,
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn amplitude_is_half_range() {
        let out = amplitude(&[Value::from(vec![1.0, 5.0, 3.0])]).unwrap();
        assert_eq!(float(out), 2.0);
    }

    #[test]
    fn weighted_average_favors_small_errors() {
        let m = Value::from(vec![0.0, 10.0]);
        let e = Value::from(vec![0.1, 1.0]);
        let out = float(weighted_average(&[m, e]).unwrap());
        assert!(out < 1.0, "weighted mean {out} should sit near the precise point");
    }

    #[test]
    fn skew_of_symmetric_data_is_zero() {
        let out = skew(&[Value::from(vec![1.0, 2.0, 3.0])]).unwrap();
        assert!(float(out).abs() < 1e-12);
    }

    #[test]
    fn constant_series_is_singular_for_stetson_k() {
        let err = stetson_k(&[Value::from(vec![2.0, 2.0, 2.0])]).unwrap_err();
        assert!(matches!(err, ComputeError::Singular(_)));
    }

    #[test]
    fn max_slope_ignores_zero_steps() {
        let t = Value::from(vec![0.0, 0.0, 1.0]);
        let m = Value::from(vec![0.0, 5.0, 7.0]);
        let out = float(max_slope(&[t, m]).unwrap());
        assert_eq!(out, 2.0);
    }
}
