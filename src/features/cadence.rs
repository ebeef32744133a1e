//! Cadence operations: statistics of the observation timing itself.
//!
//! These operate on the time axis and its first differences (the "cads"
//! series), plus a histogram of all pairwise time separations whose peaks
//! describe the dominant sampling cadences.

use std::any::Any;

use super::stats::{diff, max_value, mean, min_value, require_len};
use crate::ops::{expect_arity, ComputeError};
use crate::value::{OpaqueValue, Value};

/// Number of bins in the pairwise delta-t histogram.
const HIST_BINS: usize = 50;

/// Peaks of the normalized delta-t histogram, sorted by descending height.
#[derive(Debug, Clone)]
pub struct PeakList {
    /// `(bin index, height)` pairs, tallest first.
    pub peaks: Vec<(usize, f64)>,
}

impl OpaqueValue for PeakList {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Number of points in a series.
pub fn series_len(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Int(args[0].as_series()?.len() as i64))
}

/// `max - min` of a series.
pub fn span(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let xs = args[0].as_series()?;
    require_len(xs, 1)?;
    Ok(Value::Float(max_value(xs) - min_value(xs)))
}

pub fn mean_of(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let xs = args[0].as_series()?;
    require_len(xs, 1)?;
    Ok(Value::Float(mean(xs)))
}

pub fn median_of(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let xs = args[0].as_series()?;
    require_len(xs, 1)?;
    Ok(Value::Float(super::stats::median(xs)))
}

pub fn std_of(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let xs = args[0].as_series()?;
    require_len(xs, 1)?;
    Ok(Value::Float(super::stats::std(xs)))
}

/// Index of the largest element.
pub fn argmax(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let xs = args[0].as_series()?;
    require_len(xs, 1)?;
    let (index, _) = xs
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, &x)| {
            if x > best { (i, x) } else { (best_i, best) }
        });
    Ok(Value::Int(index as i64))
}

/// First differences of a series (the cadence series when applied to `t`).
pub fn first_diff(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let xs = args[0].as_series()?;
    require_len(xs, 2)?;
    Ok(Value::from(diff(xs)))
}

/// Fraction of cadences at or below a threshold given in minutes.
///
/// The time axis is in days, so the threshold is converted before comparing.
pub fn cad_prob(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let cads = args[0].as_series()?;
    require_len(cads, 1)?;
    let minutes = args[1].as_float()?;
    let threshold_days = minutes / (24.0 * 60.0);
    let below = cads.iter().filter(|&&c| c <= threshold_days).count();
    Ok(Value::Float(below as f64 / cads.len() as f64))
}

/// Ratios of double-step to single-step separations,
/// `(cads[i] + cads[i+1]) / cads[i+1]`.
pub fn double_to_single_step(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let cads = args[0].as_series()?;
    require_len(cads, 2)?;
    let ratios: Vec<f64> = cads
        .windows(2)
        .map(|w| (w[0] + w[1]) / w[1])
        .collect();
    Ok(Value::from(ratios))
}

/// Histogram of all pairwise time separations, 50 equal-width bins.
pub fn delta_t_hist(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let t = args[0].as_series()?;
    require_len(t, 2)?;
    let max_dt = max_value(t) - min_value(t);
    if max_dt <= 0.0 {
        return Err(ComputeError::Singular("zero time span".to_string()));
    }
    let mut counts = vec![0.0_f64; HIST_BINS];
    for i in 0..t.len() {
        for j in (i + 1)..t.len() {
            let dt = (t[j] - t[i]).abs();
            let bin = ((dt / max_dt) * HIST_BINS as f64) as usize;
            counts[bin.min(HIST_BINS - 1)] += 1.0;
        }
    }
    Ok(Value::from(counts))
}

/// Normalize a histogram to unit area over the observed time span.
pub fn normalize_hist(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let hist = args[0].as_series()?;
    require_len(hist, 1)?;
    let total_time = args[1].as_float()?;
    let total: f64 = hist.iter().sum();
    let bin_width = total_time / hist.len() as f64;
    if total <= 0.0 || bin_width <= 0.0 {
        return Err(ComputeError::Singular(
            "histogram has no mass to normalize".to_string(),
        ));
    }
    let normalized: Vec<f64> = hist.iter().map(|c| c / (total * bin_width)).collect();
    Ok(Value::from(normalized))
}

/// Local maxima of a histogram, tallest first.
pub fn find_peaks(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let hist = args[0].as_series()?;
    require_len(hist, 1)?;
    let mut peaks: Vec<(usize, f64)> = Vec::new();
    for (i, &v) in hist.iter().enumerate() {
        let left_ok = i == 0 || v > hist[i - 1];
        let right_ok = i + 1 == hist.len() || v >= hist[i + 1];
        if left_ok && right_ok && v > 0.0 {
            peaks.push((i, v));
        }
    }
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(Value::opaque(PeakList { peaks }))
}

pub fn peak_count(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let peaks = args[0].downcast_opaque::<PeakList>()?;
    Ok(Value::Int(peaks.peaks.len() as i64))
}

/// Height ratio between the i-th and j-th tallest peaks (1-based), NaN when
/// fewer peaks exist.
pub fn peak_ratio(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let peaks = &args[0].downcast_opaque::<PeakList>()?.peaks;
    let i = args[1].as_int()? as usize;
    let j = args[2].as_int()? as usize;
    let ratio = match (peaks.get(i.wrapping_sub(1)), peaks.get(j.wrapping_sub(1))) {
        (Some(&(_, a)), Some(&(_, b))) if b != 0.0 => a / b,
        _ => f64::NAN,
    };
    Ok(Value::Float(ratio))
}

/// Bin index of the i-th tallest peak (1-based), NaN when it does not exist.
pub fn peak_bin(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let peaks = &args[0].downcast_opaque::<PeakList>()?.peaks;
    let i = args[1].as_int()? as usize;
    let bin = peaks
        .get(i.wrapping_sub(1))
        .map(|&(bin, _)| bin as f64)
        .unwrap_or(f64::NAN);
    Ok(Value::Float(bin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cad_prob_counts_fractions() {
        // Cadences of 1 day and 2 days; a 1-day threshold (1440 minutes)
        // covers half of them.
        let cads = Value::from(vec![1.0, 2.0]);
        let out = cad_prob(&[cads, Value::Float(1440.0)]).unwrap();
        assert!(matches!(out, Value::Float(v) if v == 0.5));
    }

    #[test]
    fn diff_needs_two_points() {
        let err = first_diff(&[Value::from(vec![1.0])]).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::InsufficientData { needed: 2, got: 1 }
        ));
    }

    #[test]
    fn peaks_sorted_by_height() {
        let hist = Value::from(vec![0.0, 3.0, 0.0, 5.0, 0.0, 1.0]);
        let peaks_value = find_peaks(&[hist]).unwrap();
        let peaks = peaks_value.downcast_opaque::<PeakList>().unwrap();
        assert_eq!(peaks.peaks[0], (3, 5.0));
        assert_eq!(peaks.peaks[1], (1, 3.0));
    }

    #[test]
    fn peak_ratio_nan_when_missing() {
        let hist = Value::from(vec![0.0, 3.0, 0.0]);
        let peaks = find_peaks(&[hist]).unwrap();
        let out = peak_ratio(&[peaks, Value::Int(1), Value::Int(4)]).unwrap();
        assert!(matches!(out, Value::Float(v) if v.is_nan()));
    }
}
