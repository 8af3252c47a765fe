use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{DepartError, Result};

// ---------------------------------------------------------------------------
// Label encoding
// ---------------------------------------------------------------------------

/// Maps fraction labels to dense codes `0..n_classes` in ascending label order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<f64>,
}

impl LabelEncoder {
    pub fn fit(labels: &[f64]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn transform(&self, labels: &[f64]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|&label| {
                self.classes
                    .binary_search_by(|c| c.total_cmp(&label))
                    .map_err(|_| DepartError::UnknownLabel(label))
            })
            .collect()
    }

    /// Map codes back to labels. Codes out of range are a shape error.
    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<f64>> {
        codes
            .iter()
            .map(|&code| {
                self.classes.get(code).copied().ok_or_else(|| {
                    DepartError::Shape(format!(
                        "class code {code} outside 0..{}",
                        self.classes.len()
                    ))
                })
            })
            .collect()
    }
}

/// One-hot encode dense class codes.
pub fn one_hot(codes: &[usize], n_classes: usize) -> Array2<f64> {
    let mut out = Array2::zeros((codes.len(), n_classes));
    for (row, &code) in codes.iter().enumerate() {
        if code < n_classes {
            out[[row, code]] = 1.0;
        }
    }
    out
}

/// Index of the largest value in each row (first one wins on ties).
pub fn argmax_rows(values: ArrayView2<f64>) -> Vec<usize> {
    values
        .outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
                    if v > best_v {
                        (i, v)
                    } else {
                        (best, best_v)
                    }
                })
                .0
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Feature scaling
// ---------------------------------------------------------------------------

/// Per-column standardisation fitted on one split and applied to others.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    /// Constant columns get a scale of 1 so they map to zero.
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| DepartError::Shape("cannot fit a scaler on zero rows".into()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(DepartError::Shape(format!(
                "scaler fitted on {} columns, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((&x - &self.mean) / &self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn encoder_maps_sorted_labels_to_codes() {
        let enc = LabelEncoder::fit(&[5.0, 2.0, 9.0, 2.0]);
        assert_eq!(enc.classes(), &[2.0, 5.0, 9.0]);
        let codes = enc.transform(&[9.0, 2.0, 5.0]).unwrap();
        assert_eq!(codes, vec![2, 0, 1]);
        assert_eq!(enc.inverse_transform(&codes).unwrap(), vec![9.0, 2.0, 5.0]);
        assert!(matches!(enc.transform(&[3.0]), Err(DepartError::UnknownLabel(_))));
    }

    #[test]
    fn one_hot_and_argmax_agree() {
        let codes = vec![2, 0, 1];
        let encoded = one_hot(&codes, 3);
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(argmax_rows(encoded.view()), codes);
    }

    #[test]
    fn scaler_uses_fitted_statistics_only() {
        let train = array![[1.0, 10.0], [3.0, 10.0]];
        let test = array![[5.0, 12.0]];
        let scaler = StandardScaler::fit(train.view()).unwrap();

        let scaled_train = scaler.transform(train.view()).unwrap();
        assert_abs_diff_eq!(scaled_train[[0, 0]], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scaled_train[[1, 1]], 0.0, epsilon = 1e-12);

        let scaled_test = scaler.transform(test.view()).unwrap();
        assert_abs_diff_eq!(scaled_test[[0, 0]], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scaled_test[[0, 1]], 2.0, epsilon = 1e-12);
    }
}
