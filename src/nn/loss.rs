use std::str::FromStr;

use ndarray::{Array2, Zip};

use crate::error::DepartError;

const PROB_EPS: f64 = 1e-7;

/// Training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    CategoricalCrossentropy,
    MeanSquaredError,
    MeanAbsoluteError,
}

impl FromStr for Loss {
    type Err = DepartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categorical_crossentropy" => Ok(Self::CategoricalCrossentropy),
            "mse" | "mean_squared_error" => Ok(Self::MeanSquaredError),
            "mae" | "mean_absolute_error" => Ok(Self::MeanAbsoluteError),
            other => Err(DepartError::Config(format!("unknown loss '{other}'"))),
        }
    }
}

impl Loss {
    /// Mean loss over the batch.
    pub fn value(&self, pred: &Array2<f64>, target: &Array2<f64>) -> f64 {
        let n = pred.nrows().max(1) as f64;
        let m = (pred.len().max(1)) as f64;
        match self {
            Loss::CategoricalCrossentropy => {
                let mut total = 0.0;
                Zip::from(pred).and(target).for_each(|&p, &t| {
                    total -= t * p.clamp(PROB_EPS, 1.0 - PROB_EPS).ln();
                });
                total / n
            }
            Loss::MeanSquaredError => {
                let mut total = 0.0;
                Zip::from(pred).and(target).for_each(|&p, &t| total += (p - t).powi(2));
                total / m
            }
            Loss::MeanAbsoluteError => {
                let mut total = 0.0;
                Zip::from(pred).and(target).for_each(|&p, &t| total += (p - t).abs());
                total / m
            }
        }
    }

    /// Gradient of [`Loss::value`] with respect to the predictions.
    pub fn gradient(&self, pred: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        let n = pred.nrows().max(1) as f64;
        let m = (pred.len().max(1)) as f64;
        let mut grad = Array2::zeros(pred.raw_dim());
        match self {
            Loss::CategoricalCrossentropy => {
                Zip::from(&mut grad).and(pred).and(target).for_each(|g, &p, &t| {
                    *g = -t / p.clamp(PROB_EPS, 1.0 - PROB_EPS) / n;
                });
            }
            Loss::MeanSquaredError => {
                Zip::from(&mut grad)
                    .and(pred)
                    .and(target)
                    .for_each(|g, &p, &t| *g = 2.0 * (p - t) / m);
            }
            Loss::MeanAbsoluteError => {
                Zip::from(&mut grad).and(pred).and(target).for_each(|g, &p, &t| {
                    *g = if p > t {
                        1.0 / m
                    } else if p < t {
                        -1.0 / m
                    } else {
                        0.0
                    };
                });
            }
        }
        grad
    }
}
