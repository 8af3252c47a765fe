//! Agreement metrics between true and predicted fraction values.
//!
//! Every metric works on the raw values except the class-style ones, which
//! round both sides to the nearest integer (ties to even) first. Percentages
//! are reported on a 0–100 scale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DepartError, Result};

// ---------------------------------------------------------------------------
// Metric identifiers
// ---------------------------------------------------------------------------

/// One column of the metrics battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Mae,
    Mse,
    R2,
    F1Weighted,
    Accuracy,
    MeanDist,
    StdDist,
    Auc,
    ExactMatch,
    OneOff,
    TwoOff,
    ThreeOff,
    FiveOff,
    Correlation,
}

impl Metric {
    /// All metrics in report column order.
    pub const ALL: [Metric; 14] = [
        Metric::Mae,
        Metric::Mse,
        Metric::R2,
        Metric::F1Weighted,
        Metric::Accuracy,
        Metric::MeanDist,
        Metric::StdDist,
        Metric::Auc,
        Metric::ExactMatch,
        Metric::OneOff,
        Metric::TwoOff,
        Metric::ThreeOff,
        Metric::FiveOff,
        Metric::Correlation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Mae => "MAE",
            Metric::Mse => "MSE",
            Metric::R2 => "R^2",
            Metric::F1Weighted => "F1 (weighted)",
            Metric::Accuracy => "Accuracy",
            Metric::MeanDist => "mean. dist",
            Metric::StdDist => "std. dist",
            Metric::Auc => "AUC",
            Metric::ExactMatch => "0-off-pred",
            Metric::OneOff => "1-off-pred",
            Metric::TwoOff => "2-off-pred",
            Metric::ThreeOff => "3-off-pred",
            Metric::FiveOff => "5-off-pred",
            Metric::Correlation => "Correlation",
        }
    }
}

/// Label of the trailing method column.
pub const METHOD_LABEL: &str = "Method";

/// Tolerances of the k-off rates, in column order.
pub const K_OFF: [u32; 5] = [0, 1, 2, 3, 5];

// ---------------------------------------------------------------------------
// MetricSet
// ---------------------------------------------------------------------------

/// Switches for the optional parts of the battery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
    /// Compute the AUC diagnostic.
    pub auc: bool,
}

/// Result of [`MetricSet::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet {
    pub mae: f64,
    pub mse: f64,
    pub r2: f64,
    pub f1_weighted: f64,
    /// Rounded-value accuracy in [0, 1].
    pub accuracy: f64,
    pub mean_dist: f64,
    pub std_dist: f64,
    pub auc: Option<f64>,
    /// k-off rates for `K_OFF`, in percent.
    pub k_off: [f64; 5],
    pub correlation: f64,
}

impl MetricSet {
    /// Ordered column labels of a metrics table, including `Method`.
    pub fn names() -> Vec<&'static str> {
        Metric::ALL
            .iter()
            .map(Metric::label)
            .chain(std::iter::once(METHOD_LABEL))
            .collect()
    }

    /// Compute the full battery for `y_true` against `y_pred`.
    pub fn evaluate(y_true: &[f64], y_pred: &[f64], opts: EvalOptions) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(DepartError::Metrics(format!(
                "{} true values but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(DepartError::Metrics("no values to compare".into()));
        }
        if let Some(i) = y_true.iter().chain(y_pred).position(|v| !v.is_finite()) {
            let (side, row) = if i < y_true.len() {
                ("true value", i)
            } else {
                ("prediction", i - y_true.len())
            };
            return Err(DepartError::Metrics(format!("non-finite {side} at row {row}")));
        }
        let n = y_true.len() as f64;

        let mae = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n;
        let mse = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n;

        let true_cls: Vec<i64> = y_true.iter().map(|&v| round_class(v)).collect();
        let pred_cls: Vec<i64> = y_pred.iter().map(|&v| round_class(v)).collect();

        let dist: Vec<f64> = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).trunc().abs())
            .collect();
        let mean_dist = dist.iter().sum::<f64>() / n;
        let std_dist = (dist.iter().map(|d| (d - mean_dist).powi(2)).sum::<f64>() / n).sqrt();

        let k_off = K_OFF.map(|k| within_rate(&true_cls, &pred_cls, k));

        Ok(Self {
            mae,
            mse,
            r2: r2_score(y_true, y_pred),
            f1_weighted: weighted_f1(&true_cls, &pred_cls),
            accuracy: k_off[0] / 100.0,
            mean_dist,
            std_dist,
            auc: opts.auc.then(|| trapezoid_auc(y_true, y_pred)),
            k_off,
            correlation: pearson(y_true, y_pred),
        })
    }

    /// Value of a single metric (AUC is NaN when not computed).
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Mae => self.mae,
            Metric::Mse => self.mse,
            Metric::R2 => self.r2,
            Metric::F1Weighted => self.f1_weighted,
            Metric::Accuracy => self.accuracy,
            Metric::MeanDist => self.mean_dist,
            Metric::StdDist => self.std_dist,
            Metric::Auc => self.auc.unwrap_or(f64::NAN),
            Metric::ExactMatch => self.k_off[0],
            Metric::OneOff => self.k_off[1],
            Metric::TwoOff => self.k_off[2],
            Metric::ThreeOff => self.k_off[3],
            Metric::FiveOff => self.k_off[4],
            Metric::Correlation => self.correlation,
        }
    }

    /// Values in [`Metric::ALL`] order.
    pub fn values(&self) -> [f64; 14] {
        Metric::ALL.map(|m| self.get(m))
    }
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

fn round_class(v: f64) -> i64 {
    v.round_ties_even() as i64
}

/// Percentage of pairs whose rounded values differ by at most `k`.
fn within_rate(true_cls: &[i64], pred_cls: &[i64], k: u32) -> f64 {
    let hits = true_cls
        .iter()
        .zip(pred_cls)
        .filter(|(t, p)| t.abs_diff(**p) <= k as u64)
        .count();
    hits as f64 / true_cls.len() as f64 * 100.0
}

/// Coefficient of determination. A constant truth scores 1 when matched
/// exactly and 0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Pearson correlation; NaN when either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// Support-weighted mean of per-class F1 over the classes present in the
/// truth. Undefined precision/recall count as zero.
pub fn weighted_f1(true_cls: &[i64], pred_cls: &[i64]) -> f64 {
    #[derive(Default)]
    struct Counts {
        tp: usize,
        fp: usize,
        fn_: usize,
    }
    let mut counts: BTreeMap<i64, Counts> = BTreeMap::new();
    for (&t, &p) in true_cls.iter().zip(pred_cls) {
        if t == p {
            counts.entry(t).or_default().tp += 1;
        } else {
            counts.entry(t).or_default().fn_ += 1;
            counts.entry(p).or_default().fp += 1;
        }
    }

    let total = true_cls.len() as f64;
    counts
        .values()
        .map(|c| {
            let support = (c.tp + c.fn_) as f64;
            let denom = (2 * c.tp + c.fp + c.fn_) as f64;
            let f1 = if denom > 0.0 { 2.0 * c.tp as f64 / denom } else { 0.0 };
            f1 * support / total
        })
        .sum()
}

/// Trapezoid area of `y_pred` over `y_true` after sorting by (truth, pred).
///
/// A diagnostic only: the truth is treated as the x axis of a curve, which
/// has no ranking interpretation for multi-class fractions.
pub fn trapezoid_auc(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mut points: Vec<(f64, f64)> = y_true.iter().copied().zip(y_pred.iter().copied()).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn names_mode_has_fifteen_labels() {
        let names = MetricSet::names();
        assert_eq!(names.len(), 15);
        assert_eq!(names[0], "MAE");
        assert_eq!(names[8], "0-off-pred");
        assert_eq!(names[14], "Method");
    }

    #[test]
    fn identical_vectors_score_perfectly() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 3.0];
        let m = MetricSet::evaluate(&y, &y, EvalOptions { auc: true }).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.k_off, [100.0; 5]);
        assert_eq!(m.accuracy, 1.0);
        assert_abs_diff_eq!(m.f1_weighted, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.correlation, 1.0, epsilon = 1e-12);
        assert!(m.auc.is_some());
    }

    #[test]
    fn k_off_counts_rounded_distance() {
        let t = [1.0, 1.0, 1.0, 1.0, 1.0];
        let p = [1.2, 2.4, 3.0, 4.1, 6.4];
        let m = MetricSet::evaluate(&t, &p, EvalOptions::default()).unwrap();
        // rounded distances: 0, 1, 2, 3, 5
        assert_eq!(m.k_off, [20.0, 40.0, 60.0, 80.0, 100.0]);
        assert!(m.auc.is_none());
        assert!(m.correlation.is_nan());
    }

    #[test]
    fn rounding_is_half_to_even() {
        let m = MetricSet::evaluate(&[2.0, 2.0], &[2.5, 3.5], EvalOptions::default()).unwrap();
        // 2.5 -> 2 (hit), 3.5 -> 4 (miss)
        assert_eq!(m.k_off[0], 50.0);
    }

    #[test]
    fn distance_truncates_toward_zero() {
        let m = MetricSet::evaluate(&[3.0, 3.0], &[1.5, 3.9], EvalOptions::default()).unwrap();
        // |trunc(1.5)| = 1, |trunc(-0.9)| = 0
        assert_abs_diff_eq!(m.mean_dist, 0.5);
        assert_abs_diff_eq!(m.std_dist, 0.5);
    }

    #[test]
    fn weighted_f1_matches_hand_computation() {
        // class 1: tp=1 fn=1 fp=0 -> f1 2/3, support 2
        // class 2: tp=1 fn=0 fp=1 -> f1 2/3, support 1
        let f1 = weighted_f1(&[1, 1, 2], &[1, 2, 2]);
        assert_abs_diff_eq!(f1, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn r2_handles_constant_truth() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn auc_integrates_sorted_points() {
        // points (0,0) (1,1) (2,0) -> area 1
        assert_abs_diff_eq!(trapezoid_auc(&[2.0, 0.0, 1.0], &[0.0, 0.0, 1.0]), 1.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(MetricSet::evaluate(&[1.0], &[1.0, 2.0], EvalOptions::default()).is_err());
        assert!(MetricSet::evaluate(&[], &[], EvalOptions::default()).is_err());
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let err = MetricSet::evaluate(&[1.0, 2.0], &[1.0, f64::NAN], EvalOptions::default()).unwrap_err();
        assert!(matches!(err, DepartError::Metrics(msg) if msg.contains("prediction at row 1")));
        assert!(MetricSet::evaluate(&[f64::INFINITY], &[1.0], EvalOptions::default()).is_err());
    }

    proptest! {
        #[test]
        fn k_off_rates_never_decrease(
            pairs in prop::collection::vec((1.0f64..30.0, -5.0f64..40.0), 1..200)
        ) {
            let (t, p): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let m = MetricSet::evaluate(&t, &p, EvalOptions::default()).unwrap();
            for w in m.k_off.windows(2) {
                prop_assert!(w[0] <= w[1]);
            }
            prop_assert!(m.mse >= 0.0);
            prop_assert!(m.f1_weighted >= 0.0 && m.f1_weighted <= 1.0 + 1e-12);
        }
    }
}
