//! Small shared numeric helpers for the built-in operations.
//!
//! Conventions: variance and standard deviation are population moments
//! (divide by n), percentiles interpolate linearly between order statistics.

use crate::ops::ComputeError;

pub(crate) fn require_len(xs: &[f64], needed: usize) -> Result<(), ComputeError> {
    if xs.len() < needed {
        return Err(ComputeError::InsufficientData {
            needed,
            got: xs.len(),
        });
    }
    Ok(())
}

pub(crate) fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub(crate) fn variance(xs: &[f64]) -> f64 {
    let mu = mean(xs);
    xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / xs.len() as f64
}

pub(crate) fn std(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

pub(crate) fn median(xs: &[f64]) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation from the median.
pub(crate) fn mad(xs: &[f64]) -> f64 {
    let med = median(xs);
    let deviations: Vec<f64> = xs.iter().map(|x| (x - med).abs()).collect();
    median(&deviations)
}

/// Linearly interpolated percentile, `p` in `[0, 100]`.
pub(crate) fn percentile(xs: &[f64], p: f64) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let fraction = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * fraction
}

/// First differences, `xs[i + 1] - xs[i]`.
pub(crate) fn diff(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| w[1] - w[0]).collect()
}

pub(crate) fn max_value(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub(crate) fn min_value(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::INFINITY, f64::min)
}
