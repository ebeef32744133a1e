//! Wiring of the standard descriptor set: the operation registry and the
//! graph definition binding every feature name to its operation and inputs.

use crate::graph::{ArgSpec, DefinitionError, GraphBuilder, GraphDefinition};
use crate::ops::OpRegistry;
use crate::value::Value;

use super::{cadence, general, periodic, qso};

/// Cadence-probability thresholds, in minutes.
pub(crate) const CAD_PROB_THRESHOLDS: [u32; 17] = [
    1, 10, 20, 30, 40, 50, 100, 500, 1000, 5000, 10_000, 50_000, 100_000, 500_000, 1_000_000,
    5_000_000, 10_000_000,
];

/// Registry holding every operation the standard graph references.
#[must_use]
pub fn standard_ops() -> OpRegistry {
    let mut ops = OpRegistry::new();

    ops.register("series_len", cadence::series_len);
    ops.register("span", cadence::span);
    ops.register("mean", cadence::mean_of);
    ops.register("median", cadence::median_of);
    ops.register("std", cadence::std_of);
    ops.register("argmax", cadence::argmax);
    ops.register("diff", cadence::first_diff);
    ops.register("cad_prob", cadence::cad_prob);
    ops.register("double_to_single_step", cadence::double_to_single_step);
    ops.register("delta_t_hist", cadence::delta_t_hist);
    ops.register("normalize_hist", cadence::normalize_hist);
    ops.register("find_peaks", cadence::find_peaks);
    ops.register("peak_count", cadence::peak_count);
    ops.register("peak_ratio", cadence::peak_ratio);
    ops.register("peak_bin", cadence::peak_bin);

    ops.register("max", general::maximum);
    ops.register("min", general::minimum);
    ops.register("amplitude", general::amplitude);
    ops.register("percent_amplitude", general::percent_amplitude);
    ops.register("flux_percentile_ratio", general::flux_percentile_ratio);
    ops.register(
        "percent_difference_flux_percentile",
        general::percent_difference_flux_percentile,
    );
    ops.register("max_slope", general::max_slope);
    ops.register(
        "median_absolute_deviation",
        general::median_absolute_deviation,
    );
    ops.register("percent_beyond_1_std", general::percent_beyond_1_std);
    ops.register("percent_close_to_median", general::percent_close_to_median);
    ops.register("skew", general::skew);
    ops.register("weighted_average", general::weighted_average);
    ops.register("stetson_j", general::stetson_j);
    ops.register("stetson_k", general::stetson_k);

    ops.register("qso_fit", qso::qso_fit);
    ops.register("qso_log_chi2_qsonu", qso::qso_log_chi2_qsonu);
    ops.register("qso_log_chi2nu_null_chi2nu", qso::qso_log_chi2nu_null_chi2nu);

    ops.register("lomb_scargle_model", periodic::lomb_scargle_model);
    ops.register("fit_frequency", periodic::fit_frequency);
    ops.register("fit_amplitude", periodic::fit_amplitude);
    ops.register("fit_rel_phase", periodic::fit_rel_phase);
    ops.register("fit_signif", periodic::fit_signif);
    ops.register("fit_amplitude_ratio", periodic::fit_amplitude_ratio);
    ops.register("fit_frequency_ratio", periodic::fit_frequency_ratio);
    ops.register("fit_signif_ratio", periodic::fit_signif_ratio);
    ops.register("fit_lambda", periodic::fit_lambda);
    ops.register("fit_varrat", periodic::fit_varrat);
    ops.register("fit_trend", periodic::fit_trend);
    ops.register("fit_y_offset", periodic::fit_y_offset);
    ops.register("num_alias", periodic::num_alias);
    ops.register("scatter_res_raw", periodic::scatter_res_raw);
    ops.register("period_fast", periodic::period_fast);
    ops.register("periodic_model", periodic::periodic_model);
    ops.register("model_max_delta_mags", periodic::model_max_delta_mags);
    ops.register("model_min_delta_mags", periodic::model_min_delta_mags);
    ops.register("model_phi1_phi2", periodic::model_phi1_phi2);
    ops.register("period_folding", periodic::period_folding);
    ops.register("fold2p_slope_percentile", periodic::fold2p_slope_percentile);
    ops.register("medperc90_2p_p", periodic::medperc90_2p_p);
    ops.register("p2p_model", periodic::p2p_model);
    ops.register("p2p_scatter_2praw", periodic::p2p_scatter_2praw);
    ops.register("p2p_scatter_over_mad", periodic::p2p_scatter_over_mad);
    ops.register(
        "p2p_scatter_pfold_over_mad",
        periodic::p2p_scatter_pfold_over_mad,
    );
    ops.register("p2p_ssqr_diff_over_var", periodic::p2p_ssqr_diff_over_var);

    ops
}

fn inp(name: &str) -> ArgSpec {
    ArgSpec::input(name)
}

fn node(name: &str) -> ArgSpec {
    ArgSpec::node(name)
}

fn lit(value: impl Into<Value>) -> ArgSpec {
    ArgSpec::literal(value)
}

/// The standard feature graph over raw inputs `t`, `m`, `e`.
///
/// Shared intermediates (the cadence series, the delta-t histograms, the
/// fitted models) are internal nodes; everything else is a requestable
/// feature.
pub fn standard_graph() -> Result<GraphDefinition, DefinitionError> {
    let mut b = GraphBuilder::new(standard_ops()).with_inputs(["t", "m", "e"]);

    // Cadence features.
    b = b.register("n_epochs", "series_len", vec![inp("t")])?;
    b = b.register("avg_err", "mean", vec![inp("e")])?;
    b = b.register("med_err", "median", vec![inp("e")])?;
    b = b.register("std_err", "std", vec![inp("e")])?;
    b = b.register("total_time", "span", vec![inp("t")])?;
    b = b.register("avgt", "mean", vec![inp("t")])?;
    b = b.register("mean", "mean", vec![inp("m")])?;

    b = b.register_internal("cads", "diff", vec![inp("t")])?;
    b = b.register("cads_std", "std", vec![node("cads")])?;
    b = b.register("cads_avg", "mean", vec![node("cads")])?;
    b = b.register("cads_med", "median", vec![node("cads")])?;
    for threshold in CAD_PROB_THRESHOLDS {
        b = b.register(
            format!("cad_probs_{threshold}"),
            "cad_prob",
            vec![node("cads"), lit(f64::from(threshold))],
        )?;
    }

    b = b.register_internal(
        "double_to_single_step",
        "double_to_single_step",
        vec![node("cads")],
    )?;
    b = b.register(
        "avg_double_to_single_step",
        "mean",
        vec![node("double_to_single_step")],
    )?;
    b = b.register(
        "med_double_to_single_step",
        "median",
        vec![node("double_to_single_step")],
    )?;
    b = b.register(
        "std_double_to_single_step",
        "std",
        vec![node("double_to_single_step")],
    )?;

    b = b.register_internal("delta_t_hist", "delta_t_hist", vec![inp("t")])?;
    b = b.register_internal(
        "delta_t_nhist",
        "normalize_hist",
        vec![node("delta_t_hist"), node("total_time")],
    )?;
    b = b.register_internal("nhist_peaks", "find_peaks", vec![node("delta_t_nhist")])?;
    b = b.register("all_times_hist_peak_val", "max", vec![node("delta_t_hist")])?;
    b = b.register(
        "all_times_hist_peak_bin",
        "argmax",
        vec![node("delta_t_hist")],
    )?;
    b = b.register(
        "all_times_nhist_numpeaks",
        "peak_count",
        vec![node("nhist_peaks")],
    )?;
    b = b.register(
        "all_times_nhist_peak_val",
        "max",
        vec![node("delta_t_nhist")],
    )?;
    for (i, j) in [(1, 2), (1, 3), (2, 3), (1, 4), (2, 4), (3, 4)] {
        b = b.register(
            format!("all_times_nhist_peak_{i}_to_{j}"),
            "peak_ratio",
            vec![node("nhist_peaks"), lit(i as i64), lit(j as i64)],
        )?;
    }
    for i in 1..=4_i64 {
        b = b.register(
            format!("all_times_nhist_peak{i}_bin"),
            "peak_bin",
            vec![node("nhist_peaks"), lit(i)],
        )?;
    }

    // General light-curve statistics.
    b = b.register("amplitude", "amplitude", vec![inp("m")])?;
    for mid in [20, 35, 50, 65, 80] {
        b = b.register(
            format!("flux_percentile_ratio_mid{mid}"),
            "flux_percentile_ratio",
            vec![inp("m"), lit(f64::from(mid))],
        )?;
    }
    b = b.register("max_slope", "max_slope", vec![inp("t"), inp("m")])?;
    b = b.register("maximum", "max", vec![inp("m")])?;
    b = b.register("median", "median", vec![inp("m")])?;
    b = b.register(
        "median_absolute_deviation",
        "median_absolute_deviation",
        vec![inp("m")],
    )?;
    b = b.register("minimum", "min", vec![inp("m")])?;
    b = b.register("percent_amplitude", "percent_amplitude", vec![inp("m")])?;
    b = b.register(
        "percent_beyond_1_std",
        "percent_beyond_1_std",
        vec![inp("m"), inp("e")],
    )?;
    b = b.register(
        "percent_close_to_median",
        "percent_close_to_median",
        vec![inp("m")],
    )?;
    b = b.register(
        "percent_difference_flux_percentile",
        "percent_difference_flux_percentile",
        vec![inp("m")],
    )?;
    b = b.register(
        "period_fast",
        "period_fast",
        vec![inp("t"), inp("m"), inp("e")],
    )?;
    b = b.register_internal("qso_model", "qso_fit", vec![inp("t"), inp("m"), inp("e")])?;
    b = b.register(
        "qso_log_chi2_qsonu",
        "qso_log_chi2_qsonu",
        vec![node("qso_model")],
    )?;
    b = b.register(
        "qso_log_chi2nuNULL_chi2nu",
        "qso_log_chi2nu_null_chi2nu",
        vec![node("qso_model")],
    )?;
    b = b.register("skew", "skew", vec![inp("m")])?;
    b = b.register("std", "std", vec![inp("m")])?;
    b = b.register("stetson_j", "stetson_j", vec![inp("m")])?;
    b = b.register("stetson_k", "stetson_k", vec![inp("m")])?;
    b = b.register(
        "weighted_average",
        "weighted_average",
        vec![inp("m"), inp("e")],
    )?;

    // Periodogram features off a shared prewhitened three-frequency fit.
    b = b.register_internal(
        "lomb_model",
        "lomb_scargle_model",
        vec![inp("t"), inp("m"), inp("e")],
    )?;
    for f in 1..=3_i64 {
        b = b.register(
            format!("freq{f}_freq"),
            "fit_frequency",
            vec![node("lomb_model"), lit(f)],
        )?;
        for i in 1..=4_i64 {
            b = b.register(
                format!("freq{f}_amplitude{i}"),
                "fit_amplitude",
                vec![node("lomb_model"), lit(f), lit(i)],
            )?;
        }
        for i in 2..=4_i64 {
            b = b.register(
                format!("freq{f}_rel_phase{i}"),
                "fit_rel_phase",
                vec![node("lomb_model"), lit(f), lit(i)],
            )?;
        }
    }
    b = b.register("freq1_signif", "fit_signif", vec![node("lomb_model")])?;
    b = b.register("freq1_lambda", "fit_lambda", vec![node("lomb_model")])?;
    for f in 2..=3_i64 {
        b = b.register(
            format!("freq_amplitude_ratio_{f}1"),
            "fit_amplitude_ratio",
            vec![node("lomb_model"), lit(f)],
        )?;
        b = b.register(
            format!("freq_frequency_ratio_{f}1"),
            "fit_frequency_ratio",
            vec![node("lomb_model"), lit(f)],
        )?;
        b = b.register(
            format!("freq_signif_ratio_{f}1"),
            "fit_signif_ratio",
            vec![node("lomb_model"), lit(f)],
        )?;
    }
    b = b.register("freq_n_alias", "num_alias", vec![node("lomb_model")])?;
    b = b.register("freq_varrat", "fit_varrat", vec![node("lomb_model")])?;
    b = b.register("linear_trend", "fit_trend", vec![node("lomb_model")])?;
    b = b.register("freq_y_offset", "fit_y_offset", vec![node("lomb_model")])?;
    b = b.register(
        "scatter_res_raw",
        "scatter_res_raw",
        vec![node("lomb_model"), inp("m")],
    )?;

    b = b.register_internal("periodic_model", "periodic_model", vec![node("lomb_model")])?;
    b = b.register(
        "freq_model_max_delta_mags",
        "model_max_delta_mags",
        vec![node("periodic_model")],
    )?;
    b = b.register(
        "freq_model_min_delta_mags",
        "model_min_delta_mags",
        vec![node("periodic_model")],
    )?;
    b = b.register(
        "freq_model_phi1_phi2",
        "model_phi1_phi2",
        vec![node("periodic_model")],
    )?;

    b = b.register_internal(
        "period_folded_model",
        "period_folding",
        vec![inp("t"), inp("m"), inp("e"), node("lomb_model")],
    )?;
    for p in [10, 90] {
        b = b.register(
            format!("fold2P_slope_{p}percentile"),
            "fold2p_slope_percentile",
            vec![node("period_folded_model"), lit(f64::from(p))],
        )?;
    }
    b = b.register(
        "medperc90_2p_p",
        "medperc90_2p_p",
        vec![node("period_folded_model")],
    )?;

    b = b.register_internal(
        "p2p_model",
        "p2p_model",
        vec![inp("t"), inp("m"), node("freq1_freq")],
    )?;
    b = b.register(
        "p2p_scatter_2praw",
        "p2p_scatter_2praw",
        vec![node("p2p_model")],
    )?;
    b = b.register(
        "p2p_scatter_over_mad",
        "p2p_scatter_over_mad",
        vec![node("p2p_model")],
    )?;
    b = b.register(
        "p2p_scatter_pfold_over_mad",
        "p2p_scatter_pfold_over_mad",
        vec![node("p2p_model")],
    )?;
    b = b.register(
        "p2p_ssqr_diff_over_var",
        "p2p_ssqr_diff_over_var",
        vec![node("p2p_model")],
    )?;

    b.finalize()
}
