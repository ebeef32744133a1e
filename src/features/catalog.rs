//! Category metadata for the standard graph: which public names belong to
//! which selector tag, plus descriptive tags per feature.

use crate::catalog::CategoryRegistry;

use super::graph::CAD_PROB_THRESHOLDS;

/// Categories and tags for [`standard_graph`](super::standard_graph).
///
/// The member lists cover exactly the graph's public names, so `all` expands
/// to the complete feature set.
#[must_use]
pub fn standard_catalog() -> CategoryRegistry {
    let mut cadence: Vec<String> = [
        "n_epochs",
        "avg_err",
        "med_err",
        "std_err",
        "total_time",
        "avgt",
        "cads_std",
        "mean",
        "cads_avg",
        "cads_med",
    ]
    .map(String::from)
    .to_vec();
    for threshold in CAD_PROB_THRESHOLDS {
        cadence.push(format!("cad_probs_{threshold}"));
    }
    cadence.extend(
        [
            "med_double_to_single_step",
            "avg_double_to_single_step",
            "std_double_to_single_step",
            "all_times_hist_peak_val",
            "all_times_hist_peak_bin",
            "all_times_nhist_numpeaks",
            "all_times_nhist_peak_val",
            "all_times_nhist_peak_1_to_2",
            "all_times_nhist_peak_1_to_3",
            "all_times_nhist_peak_2_to_3",
            "all_times_nhist_peak_1_to_4",
            "all_times_nhist_peak_2_to_4",
            "all_times_nhist_peak_3_to_4",
            "all_times_nhist_peak1_bin",
            "all_times_nhist_peak2_bin",
            "all_times_nhist_peak3_bin",
            "all_times_nhist_peak4_bin",
        ]
        .map(String::from),
    );

    let general: Vec<String> = [
        "amplitude",
        "flux_percentile_ratio_mid20",
        "flux_percentile_ratio_mid35",
        "flux_percentile_ratio_mid50",
        "flux_percentile_ratio_mid65",
        "flux_percentile_ratio_mid80",
        "max_slope",
        "maximum",
        "median",
        "median_absolute_deviation",
        "minimum",
        "percent_amplitude",
        "percent_beyond_1_std",
        "percent_close_to_median",
        "percent_difference_flux_percentile",
        "period_fast",
        "qso_log_chi2_qsonu",
        "qso_log_chi2nuNULL_chi2nu",
        "skew",
        "std",
        "stetson_j",
        "stetson_k",
        "weighted_average",
    ]
    .map(String::from)
    .to_vec();

    let mut lomb_scargle: Vec<String> = [
        "fold2P_slope_10percentile",
        "fold2P_slope_90percentile",
    ]
    .map(String::from)
    .to_vec();
    for f in 1..=3 {
        for i in 1..=4 {
            lomb_scargle.push(format!("freq{f}_amplitude{i}"));
        }
        lomb_scargle.push(format!("freq{f}_freq"));
        if f == 1 {
            lomb_scargle.push("freq1_lambda".to_string());
        }
        for i in 2..=4 {
            lomb_scargle.push(format!("freq{f}_rel_phase{i}"));
        }
        if f == 1 {
            lomb_scargle.push("freq1_signif".to_string());
        }
    }
    lomb_scargle.extend(
        [
            "freq_amplitude_ratio_21",
            "freq_amplitude_ratio_31",
            "freq_frequency_ratio_21",
            "freq_frequency_ratio_31",
            "freq_model_max_delta_mags",
            "freq_model_min_delta_mags",
            "freq_model_phi1_phi2",
            "freq_n_alias",
            "freq_signif_ratio_21",
            "freq_signif_ratio_31",
            "freq_varrat",
            "freq_y_offset",
            "linear_trend",
            "medperc90_2p_p",
            "p2p_scatter_2praw",
            "p2p_scatter_over_mad",
            "p2p_scatter_pfold_over_mad",
            "p2p_ssqr_diff_over_var",
            "scatter_res_raw",
        ]
        .map(String::from),
    );

    let mut registry = CategoryRegistry::new();
    for name in &cadence {
        let mut tags = vec!["astronomy", "cadence"];
        if name.ends_with("_err") {
            tags.push("error");
        }
        registry = registry.with_tags(name.clone(), tags);
    }
    for name in &general {
        registry = registry.with_tags(name.clone(), ["astronomy", "general"]);
    }
    for name in &lomb_scargle {
        registry = registry.with_tags(name.clone(), ["astronomy", "periodic", "lomb_scargle"]);
    }

    registry
        .with_category("cadence", cadence)
        .with_category("general", general)
        .with_category("lomb_scargle", lomb_scargle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ALL;

    #[test]
    fn category_counts() {
        let catalog = standard_catalog();
        assert_eq!(catalog.category("cadence").unwrap().len(), 44);
        assert_eq!(catalog.category("general").unwrap().len(), 23);
        assert_eq!(catalog.category("lomb_scargle").unwrap().len(), 47);
    }

    #[test]
    fn all_expands_every_category_in_order() {
        let catalog = standard_catalog();
        let names = catalog.expand([ALL]).unwrap();
        assert_eq!(names.len(), 44 + 23 + 47);
        assert_eq!(names[0], "n_epochs");
    }

    #[test]
    fn categories_are_declared_in_order() {
        let catalog = standard_catalog();
        let tags: Vec<&str> = catalog.category_tags().collect();
        assert_eq!(tags, vec!["cadence", "general", "lomb_scargle"]);
    }

    #[test]
    fn error_features_are_tagged() {
        let catalog = standard_catalog();
        assert!(catalog.tags_for("avg_err").contains(&"error".to_string()));
        assert!(!catalog.tags_for("avgt").contains(&"error".to_string()));
    }
}
