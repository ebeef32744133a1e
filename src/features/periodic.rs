//! Periodogram-derived features: prewhitened grid-search harmonic fits at the
//! three strongest frequencies, the phase-folded model shape, and
//! point-to-point scatter statistics of the series folded at the fundamental.
//!
//! Each component is a least-squares model `c0 + c1 (t - t0) +
//! sum_{k=1..4} a_k sin(k w t) + b_k cos(k w t)` fitted at the best frequency
//! of a grid scan; its model is subtracted (prewhitening) before the next
//! component is fitted on the residuals.

use std::any::Any;

use super::stats::{diff, mad, mean, median, percentile, require_len, variance};
use crate::ops::{expect_arity, ComputeError};
use crate::value::{OpaqueValue, Value};

const NFREQS: usize = 3;
const HARMONICS: usize = 4;
const GRID_STEPS: usize = 1000;
const PHASE_STEPS: usize = 1000;
const MIN_POINTS: usize = 10;
const PIVOT_EPS: f64 = 1e-12;
/// Ridge term added to the normal-equation diagonal; reported as the fit's
/// regularization level.
const RIDGE_LAMBDA: f64 = 1e-8;
/// Relative tolerance for counting a frequency as a cycles-per-day alias.
const ALIAS_TOLERANCE: f64 = 0.025;

/// One prewhitened frequency component of the harmonic model.
#[derive(Debug, Clone, Default)]
pub struct ComponentFit {
    pub frequency: f64,
    /// Amplitude of each harmonic, fundamental first.
    pub amplitudes: [f64; HARMONICS],
    /// Phase of each harmonic relative to the fundamental; the first entry
    /// is zero by construction.
    pub rel_phases: [f64; HARMONICS],
    /// Z-score of the best periodogram power over the scanned grid.
    pub signif: f64,
    /// Sine/cosine coefficients per harmonic, `[s1, c1, s2, c2, ...]`.
    coefficients: [f64; 2 * HARMONICS],
}

/// Harmonic model fitted at the best periodogram frequencies, strongest
/// component first.
#[derive(Debug, Clone)]
pub struct LombModel {
    pub components: [ComponentFit; NFREQS],
    /// Regularization level applied to every component fit.
    pub lambda: f64,
    /// Residual variance over series variance, after all components.
    pub varrat: f64,
    /// Linear trend coefficient of the first component fit (per day).
    pub trend: f64,
    /// Constant offset of the first component fit.
    pub y_offset: f64,
    /// Per-point residuals after subtracting every component.
    pub residuals: Vec<f64>,
}

impl OpaqueValue for LombModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shape statistics of the fundamental-component model over one phase cycle.
#[derive(Debug, Clone)]
pub struct PeriodicModel {
    pub max_delta_mags: f64,
    pub min_delta_mags: f64,
    pub phi1_phi2: f64,
}

impl OpaqueValue for PeriodicModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The series folded at twice the fundamental period.
#[derive(Debug, Clone)]
pub struct FoldedModel {
    /// Point-to-point slopes of the 2P-folded series, by phase.
    pub fold2p_slopes: Vec<f64>,
    /// Median 2P-folded point-to-point scatter over the 90th percentile of
    /// the P-folded scatter.
    pub medperc90_2p_p: f64,
}

impl OpaqueValue for FoldedModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Folded point-to-point scatter statistics.
#[derive(Debug, Clone)]
pub struct P2pModel {
    pub scatter_2praw: f64,
    pub scatter_over_mad: f64,
    pub scatter_pfold_over_mad: f64,
    pub ssqr_diff_over_var: f64,
}

impl OpaqueValue for P2pModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fit the prewhitened multi-frequency harmonic model.
pub fn lomb_scargle_model(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let t = args[0].as_series()?;
    let m = args[1].as_series()?;
    let _e = args[2].as_series()?;
    require_len(t, MIN_POINTS)?;
    if t.len() != m.len() {
        return Err(ComputeError::Singular(
            "time and value series differ in length".to_string(),
        ));
    }

    let t0 = t[0];
    let mut residuals: Vec<f64> = m.to_vec();
    let mut components: [ComponentFit; NFREQS] = Default::default();
    let mut trend = 0.0;
    let mut y_offset = 0.0;

    for c in 0..NFREQS {
        let (frequency, signif) = match scan_grid(t, &residuals) {
            Ok(found) => found,
            // The first component must fit; later ones go flat when the
            // residual carries no further structure.
            Err(error) if c == 0 => return Err(error),
            Err(_) => break,
        };
        let fit = harmonic_fit(t, &residuals, frequency)?;
        if c == 0 {
            y_offset = fit[0];
            trend = fit[1];
        }

        let omega = 2.0 * std::f64::consts::PI * frequency;
        for (&ti, r) in t.iter().zip(&mut residuals) {
            *r -= model_value(&fit, ti, t0, omega);
        }

        components[c] = component_from_fit(frequency, signif, &fit);
    }

    let series_var = variance(m);
    let varrat = if series_var > 0.0 {
        variance(&residuals) / series_var
    } else {
        f64::NAN
    };

    Ok(Value::opaque(LombModel {
        components,
        lambda: RIDGE_LAMBDA,
        varrat,
        trend,
        y_offset,
        residuals,
    }))
}

/// Frequency of the i-th component (1-based literal index).
pub fn fit_frequency(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let component = component_index(args[1].as_int()?)?;
    Ok(Value::Float(model.components[component].frequency))
}

/// Amplitude of the j-th harmonic of the i-th component (1-based literals).
pub fn fit_amplitude(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let component = component_index(args[1].as_int()?)?;
    let harmonic = harmonic_index(args[2].as_int()?)?;
    Ok(Value::Float(model.components[component].amplitudes[harmonic]))
}

/// Relative phase of the j-th harmonic of the i-th component.
pub fn fit_rel_phase(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let component = component_index(args[1].as_int()?)?;
    let harmonic = harmonic_index(args[2].as_int()?)?;
    Ok(Value::Float(model.components[component].rel_phases[harmonic]))
}

/// Significance of the fundamental component.
pub fn fit_signif(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    Ok(Value::Float(model.components[0].signif))
}

/// First-harmonic amplitude of component i over the fundamental's.
pub fn fit_amplitude_ratio(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let component = component_index(args[1].as_int()?)?;
    Ok(Value::Float(
        model.components[component].amplitudes[0] / model.components[0].amplitudes[0],
    ))
}

/// Frequency of component i over the fundamental's.
pub fn fit_frequency_ratio(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let component = component_index(args[1].as_int()?)?;
    Ok(Value::Float(
        model.components[component].frequency / model.components[0].frequency,
    ))
}

/// Significance of component i over the fundamental's.
pub fn fit_signif_ratio(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let component = component_index(args[1].as_int()?)?;
    Ok(Value::Float(
        model.components[component].signif / model.components[0].signif,
    ))
}

/// Regularization level of the fit.
pub fn fit_lambda(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    Ok(Value::Float(model.lambda))
}

pub fn fit_varrat(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    Ok(Value::Float(model.varrat))
}

pub fn fit_trend(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    Ok(Value::Float(model.trend))
}

pub fn fit_y_offset(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    Ok(Value::Float(model.y_offset))
}

/// Number of fitted frequencies within tolerance of a whole number of cycles
/// per day, i.e. likely sampling aliases.
pub fn num_alias(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let aliases = model
        .components
        .iter()
        .filter(|component| {
            let f = component.frequency;
            let nearest = f.round();
            nearest >= 1.0 && (f - nearest).abs() <= ALIAS_TOLERANCE * nearest
        })
        .count();
    Ok(Value::Int(aliases as i64))
}

/// Residual scatter of the harmonic fit over the raw scatter, both as MAD.
pub fn scatter_res_raw(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let m = args[1].as_series()?;
    require_len(m, 1)?;
    let raw = mad(m);
    if raw == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }
    Ok(Value::Float(mad(&model.residuals) / raw))
}

/// Best period from a standalone periodogram scan.
pub fn period_fast(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let t = args[0].as_series()?;
    let m = args[1].as_series()?;
    let _e = args[2].as_series()?;
    require_len(t, MIN_POINTS)?;
    if t.len() != m.len() {
        return Err(ComputeError::Singular(
            "time and value series differ in length".to_string(),
        ));
    }
    let (frequency, _) = scan_grid(t, m)?;
    Ok(Value::Float(1.0 / frequency))
}

/// Evaluate the fundamental component over one phase cycle and extract its
/// extremum structure.
pub fn periodic_model(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    let model = args[0].downcast_opaque::<LombModel>()?;
    let fundamental = &model.components[0];

    let two_pi = 2.0 * std::f64::consts::PI;
    let ys: Vec<f64> = (0..PHASE_STEPS)
        .map(|i| {
            let phase = i as f64 / PHASE_STEPS as f64;
            let mut y = 0.0;
            for k in 0..HARMONICS {
                let angle = two_pi * (k as f64 + 1.0) * phase;
                y += fundamental.coefficients[2 * k] * angle.sin()
                    + fundamental.coefficients[2 * k + 1] * angle.cos();
            }
            y
        })
        .collect();

    // Circular local extrema in phase order.
    let mut extrema: Vec<(f64, f64, bool)> = Vec::new();
    for i in 0..PHASE_STEPS {
        let prev = ys[(i + PHASE_STEPS - 1) % PHASE_STEPS];
        let next = ys[(i + 1) % PHASE_STEPS];
        let phase = i as f64 / PHASE_STEPS as f64;
        if ys[i] > prev && ys[i] >= next {
            extrema.push((phase, ys[i], true));
        } else if ys[i] < prev && ys[i] <= next {
            extrema.push((phase, ys[i], false));
        }
    }

    let (max_delta_mags, min_delta_mags) = if extrema.len() >= 2 {
        let deltas: Vec<f64> = (0..extrema.len())
            .map(|i| (extrema[i].1 - extrema[(i + 1) % extrema.len()].1).abs())
            .collect();
        (
            deltas.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            deltas.iter().copied().fold(f64::INFINITY, f64::min),
        )
    } else {
        (f64::NAN, f64::NAN)
    };

    let mut maxima: Vec<(f64, f64)> = extrema
        .iter()
        .filter(|(_, _, is_max)| *is_max)
        .map(|&(phase, value, _)| (phase, value))
        .collect();
    maxima.sort_by(|a, b| b.1.total_cmp(&a.1));
    let phi1_phi2 = if maxima.len() >= 2 {
        (maxima[0].0 - maxima[1].0).abs()
    } else {
        f64::NAN
    };

    Ok(Value::opaque(PeriodicModel {
        max_delta_mags,
        min_delta_mags,
        phi1_phi2,
    }))
}

pub fn model_max_delta_mags(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<PeriodicModel>()?.max_delta_mags,
    ))
}

pub fn model_min_delta_mags(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<PeriodicModel>()?.min_delta_mags,
    ))
}

pub fn model_phi1_phi2(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<PeriodicModel>()?.phi1_phi2,
    ))
}

/// Fold the series at twice the fundamental period and collect its slope and
/// scatter statistics.
pub fn period_folding(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 4)?;
    let t = args[0].as_series()?;
    let m = args[1].as_series()?;
    let _e = args[2].as_series()?;
    let model = args[3].downcast_opaque::<LombModel>()?;
    require_len(m, 2)?;
    if t.len() != m.len() {
        return Err(ComputeError::Singular(
            "time and value series differ in length".to_string(),
        ));
    }

    let frequency = model.components[0].frequency;
    if frequency <= 0.0 || !frequency.is_finite() {
        return Err(ComputeError::Singular(format!(
            "cannot fold at frequency {frequency}"
        )));
    }

    let folded_2p = fold_with_phase(t, m, frequency * 0.5);
    let folded_1p = fold_with_phase(t, m, frequency);

    let fold2p_slopes: Vec<f64> = folded_2p
        .windows(2)
        .filter(|w| w[1].0 - w[0].0 > PIVOT_EPS)
        .map(|w| (w[1].1 - w[0].1) / (w[1].0 - w[0].0))
        .collect();
    if fold2p_slopes.is_empty() {
        return Err(ComputeError::Singular(
            "folded series has no distinct phases".to_string(),
        ));
    }

    let diffs_2p: Vec<f64> = folded_2p.windows(2).map(|w| (w[1].1 - w[0].1).abs()).collect();
    let diffs_1p: Vec<f64> = folded_1p.windows(2).map(|w| (w[1].1 - w[0].1).abs()).collect();
    let denom = percentile(&diffs_1p, 90.0);
    if denom == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }

    Ok(Value::opaque(FoldedModel {
        medperc90_2p_p: median(&diffs_2p) / denom,
        fold2p_slopes,
    }))
}

/// Percentile of the 2P-folded point-to-point slopes (literal percentile).
pub fn fold2p_slope_percentile(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 2)?;
    let folded = args[0].downcast_opaque::<FoldedModel>()?;
    let p = args[1].as_float()?;
    Ok(Value::Float(percentile(&folded.fold2p_slopes, p)))
}

pub fn medperc90_2p_p(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<FoldedModel>()?.medperc90_2p_p,
    ))
}

/// Point-to-point scatter statistics of the series folded at a frequency.
pub fn p2p_model(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 3)?;
    let t = args[0].as_series()?;
    let m = args[1].as_series()?;
    let frequency = args[2].as_float()?;
    require_len(m, 2)?;
    if t.len() != m.len() {
        return Err(ComputeError::Singular(
            "time and value series differ in length".to_string(),
        ));
    }
    if frequency <= 0.0 || !frequency.is_finite() {
        return Err(ComputeError::Singular(format!(
            "cannot fold at frequency {frequency}"
        )));
    }

    let raw_diffs = diff(m);
    let sumsqr_unfold = median(&sq(&raw_diffs));
    let series_mad = mad(m);
    let series_var = variance(m);
    if sumsqr_unfold == 0.0 || series_mad == 0.0 || series_var == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }

    let folded_2p = fold(t, m, frequency * 0.5);
    let folded_1p = fold(t, m, frequency);
    let diffs_2p = diff(&folded_2p);
    let diffs_1p = diff(&folded_1p);

    Ok(Value::opaque(P2pModel {
        scatter_2praw: median(&sq(&diffs_2p)) / sumsqr_unfold,
        scatter_over_mad: median(&abs(&raw_diffs)) / series_mad,
        scatter_pfold_over_mad: median(&abs(&diffs_1p)) / series_mad,
        ssqr_diff_over_var: mean(&sq(&raw_diffs)) / series_var,
    }))
}

pub fn p2p_scatter_2praw(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<P2pModel>()?.scatter_2praw,
    ))
}

pub fn p2p_scatter_over_mad(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<P2pModel>()?.scatter_over_mad,
    ))
}

pub fn p2p_scatter_pfold_over_mad(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0]
            .downcast_opaque::<P2pModel>()?
            .scatter_pfold_over_mad,
    ))
}

pub fn p2p_ssqr_diff_over_var(args: &[Value]) -> Result<Value, ComputeError> {
    expect_arity(args, 1)?;
    Ok(Value::Float(
        args[0].downcast_opaque::<P2pModel>()?.ssqr_diff_over_var,
    ))
}

fn component_from_fit(frequency: f64, signif: f64, fit: &[f64; 10]) -> ComponentFit {
    let mut coefficients = [0.0; 2 * HARMONICS];
    coefficients.copy_from_slice(&fit[2..]);

    let mut amplitudes = [0.0; HARMONICS];
    let mut phases = [0.0; HARMONICS];
    for k in 0..HARMONICS {
        let a = coefficients[2 * k];
        let b = coefficients[2 * k + 1];
        amplitudes[k] = (a * a + b * b).sqrt();
        phases[k] = b.atan2(a);
    }
    let mut rel_phases = [0.0; HARMONICS];
    for k in 1..HARMONICS {
        rel_phases[k] = wrap_phase(phases[k] - (k as f64 + 1.0) * phases[0]);
    }

    ComponentFit {
        frequency,
        amplitudes,
        rel_phases,
        signif,
        coefficients,
    }
}

fn sq(xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|x| x * x).collect()
}

fn abs(xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|x| x.abs()).collect()
}

/// Scan the frequency grid with a single-harmonic fit; returns the best
/// frequency and the z-score of its power over the grid.
fn scan_grid(t: &[f64], m: &[f64]) -> Result<(f64, f64), ComputeError> {
    let span = t.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - t.iter().copied().fold(f64::INFINITY, f64::min);
    if span <= 0.0 {
        return Err(ComputeError::Singular("zero time span".to_string()));
    }
    let f_min = 1.0 / span;
    let cadences = diff(t);
    let median_cadence = median(&cadences);
    let f_max = if median_cadence > 0.0 {
        0.5 / median_cadence
    } else {
        10.0 / span
    };
    let f_max = f_max.max(f_min * 2.0);

    let total_var = variance(m);
    if total_var == 0.0 {
        return Err(ComputeError::Singular("series is constant".to_string()));
    }
    let mu = mean(m);

    let mut powers = Vec::with_capacity(GRID_STEPS);
    let mut best = (f_min, f64::NEG_INFINITY);
    let step = (f_max - f_min) / (GRID_STEPS - 1) as f64;
    for i in 0..GRID_STEPS {
        let frequency = f_min + step * i as f64;
        let omega = 2.0 * std::f64::consts::PI * frequency;

        // Single-harmonic least squares against the centered series.
        let mut s_ss = 0.0;
        let mut s_cc = 0.0;
        let mut s_sc = 0.0;
        let mut s_ys = 0.0;
        let mut s_yc = 0.0;
        for (&ti, &mi) in t.iter().zip(m) {
            let (s, c) = (omega * ti).sin_cos();
            let y = mi - mu;
            s_ss += s * s;
            s_cc += c * c;
            s_sc += s * c;
            s_ys += y * s;
            s_yc += y * c;
        }
        let det = s_ss * s_cc - s_sc * s_sc;
        let power = if det.abs() < PIVOT_EPS {
            0.0
        } else {
            let a = (s_ys * s_cc - s_yc * s_sc) / det;
            let b = (s_yc * s_ss - s_ys * s_sc) / det;
            (a * s_ys + b * s_yc) / (total_var * m.len() as f64)
        };
        powers.push(power);
        if power > best.1 {
            best = (frequency, power);
        }
    }

    let power_mean = mean(&powers);
    let power_std = variance(&powers).sqrt();
    let signif = if power_std > 0.0 {
        (best.1 - power_mean) / power_std
    } else {
        0.0
    };
    Ok((best.0, signif))
}

/// Full 10-parameter ridge fit at a fixed frequency: constant, linear trend,
/// and four sine/cosine harmonic pairs.
fn harmonic_fit(t: &[f64], m: &[f64], frequency: f64) -> Result<[f64; 10], ComputeError> {
    let t0 = t[0];
    let omega = 2.0 * std::f64::consts::PI * frequency;
    let n_params = 2 + 2 * HARMONICS;

    // Normal equations, accumulated row by row.
    let mut ata = [[0.0_f64; 10]; 10];
    let mut aty = [0.0_f64; 10];
    let mut row = [0.0_f64; 10];
    for (&ti, &mi) in t.iter().zip(m) {
        row[0] = 1.0;
        row[1] = ti - t0;
        for k in 0..HARMONICS {
            let (s, c) = ((k as f64 + 1.0) * omega * ti).sin_cos();
            row[2 + 2 * k] = s;
            row[3 + 2 * k] = c;
        }
        for i in 0..n_params {
            aty[i] += row[i] * mi;
            for j in 0..n_params {
                ata[i][j] += row[i] * row[j];
            }
        }
    }
    for (i, diag_row) in ata.iter_mut().enumerate().take(n_params) {
        diag_row[i] += RIDGE_LAMBDA;
    }

    solve(ata, aty)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: [[f64; 10]; 10], mut b: [f64; 10]) -> Result<[f64; 10], ComputeError> {
    let n = 10;
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() < PIVOT_EPS {
            return Err(ComputeError::Singular(
                "harmonic design matrix is singular".to_string(),
            ));
        }
        if pivot_row != col {
            a.swap(col, pivot_row);
            b.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0_f64; 10];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Ok(x)
}

fn model_value(c: &[f64; 10], t: f64, t0: f64, omega: f64) -> f64 {
    let mut y = c[0] + c[1] * (t - t0);
    for k in 0..HARMONICS {
        let (s, cos) = ((k as f64 + 1.0) * omega * t).sin_cos();
        y += c[2 + 2 * k] * s + c[3 + 2 * k] * cos;
    }
    y
}

/// Sort the value series by phase when folded at `frequency`.
fn fold(t: &[f64], m: &[f64], frequency: f64) -> Vec<f64> {
    fold_with_phase(t, m, frequency)
        .into_iter()
        .map(|(_, mi)| mi)
        .collect()
}

fn fold_with_phase(t: &[f64], m: &[f64], frequency: f64) -> Vec<(f64, f64)> {
    let mut indexed: Vec<(f64, f64)> = t
        .iter()
        .zip(m)
        .map(|(&ti, &mi)| ((ti * frequency).rem_euclid(1.0), mi))
        .collect();
    indexed.sort_by(|a, b| a.0.total_cmp(&b.0));
    indexed
}

fn wrap_phase(phi: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut wrapped = phi.rem_euclid(two_pi);
    if wrapped > std::f64::consts::PI {
        wrapped -= two_pi;
    }
    wrapped
}

fn component_index(one_based: i64) -> Result<usize, ComputeError> {
    let idx = one_based - 1;
    if (0..NFREQS as i64).contains(&idx) {
        Ok(idx as usize)
    } else {
        Err(ComputeError::Singular(format!(
            "component index {one_based} out of range 1..={NFREQS}"
        )))
    }
}

fn harmonic_index(one_based: i64) -> Result<usize, ComputeError> {
    let idx = one_based - 1;
    if (0..HARMONICS as i64).contains(&idx) {
        Ok(idx as usize)
    } else {
        Err(ComputeError::Singular(format!(
            "harmonic index {one_based} out of range 1..={HARMONICS}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinusoid(n: usize, frequency: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..n).map(|i| i as f64 * 0.37).collect();
        let m: Vec<f64> = t
            .iter()
            .map(|&ti| 3.0 + (2.0 * std::f64::consts::PI * frequency * ti).sin())
            .collect();
        let e = vec![0.1; n];
        (t, m, e)
    }

    fn fit_model(t: Vec<f64>, m: Vec<f64>, e: Vec<f64>) -> Value {
        lomb_scargle_model(&[Value::from(t), Value::from(m), Value::from(e)]).unwrap()
    }

    #[test]
    fn recovers_the_injected_frequency() {
        let (t, m, e) = sinusoid(60, 0.25);
        let model_value = fit_model(t, m, e);
        let model = model_value.downcast_opaque::<LombModel>().unwrap();
        let fundamental = &model.components[0];
        assert!(
            (fundamental.frequency - 0.25).abs() < 0.02,
            "recovered {}",
            fundamental.frequency
        );
        assert!(model.varrat < 0.1, "residual variance ratio {}", model.varrat);
        assert!((model.y_offset - 3.0).abs() < 0.2);
    }

    #[test]
    fn prewhitening_finds_the_second_component() {
        let n = 80;
        let t: Vec<f64> = (0..n).map(|i| i as f64 * 0.3).collect();
        let m: Vec<f64> = t
            .iter()
            .map(|&ti| {
                let w = 2.0 * std::f64::consts::PI;
                (w * 0.2 * ti).sin() + 0.4 * (w * 0.33 * ti).sin()
            })
            .collect();
        let e = vec![0.05; n];

        let model_value = fit_model(t, m, e);
        let model = model_value.downcast_opaque::<LombModel>().unwrap();
        assert!(
            (model.components[0].frequency - 0.2).abs() < 0.02,
            "fundamental {}",
            model.components[0].frequency
        );
        assert!(
            (model.components[1].frequency - 0.33).abs() < 0.02,
            "second component {}",
            model.components[1].frequency
        );
        let ratio = model.components[1].amplitudes[0] / model.components[0].amplitudes[0];
        assert!((ratio - 0.4).abs() < 0.2, "amplitude ratio {ratio}");
    }

    #[test]
    fn too_few_points_is_insufficient_data() {
        let err = lomb_scargle_model(&[
            Value::from(vec![0.0, 1.0, 2.0, 3.0]),
            Value::from(vec![1.0, 2.0, 1.5, 1.8]),
            Value::from(vec![0.1, 0.1, 0.1, 0.1]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ComputeError::InsufficientData { needed: 10, got: 4 }
        ));
    }

    #[test]
    fn constant_series_is_singular() {
        let t: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let m = vec![1.0; 20];
        let e = vec![0.1; 20];
        let err =
            lomb_scargle_model(&[Value::from(t), Value::from(m), Value::from(e)]).unwrap_err();
        assert!(matches!(err, ComputeError::Singular(_)));
    }

    #[test]
    fn periodic_model_of_a_sinusoid_has_one_maximum() {
        let (t, m, e) = sinusoid(60, 0.25);
        let model = fit_model(t, m, e);
        let shape_value = periodic_model(&[model]).unwrap();
        let shape = shape_value.downcast_opaque::<PeriodicModel>().unwrap();
        // One maximum and one minimum a full amplitude swing apart.
        assert!(shape.max_delta_mags > 1.5, "max delta {}", shape.max_delta_mags);
        assert!(shape.phi1_phi2.is_nan());
    }

    #[test]
    fn day_aliased_frequency_is_counted() {
        let mut model = LombModel {
            components: Default::default(),
            lambda: RIDGE_LAMBDA,
            varrat: 0.1,
            trend: 0.0,
            y_offset: 0.0,
            residuals: vec![],
        };
        model.components[0].frequency = 1.01;
        model.components[1].frequency = 0.37;
        model.components[2].frequency = 2.98;
        let out = num_alias(&[Value::opaque(model)]).unwrap();
        assert!(matches!(out, Value::Int(2)));
    }

    #[test]
    fn folding_orders_by_phase() {
        let folded = fold(&[0.0, 0.6, 1.2], &[1.0, 2.0, 3.0], 1.0);
        // Phases are 0.0, 0.6, 0.2 so the third point sorts second.
        assert_eq!(folded, vec![1.0, 3.0, 2.0]);
    }
}
