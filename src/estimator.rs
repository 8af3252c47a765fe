//! The fit/predict contract the cross-validation harness drives.
//!
//! Anything that can be trained on a feature matrix and produce a prediction
//! matrix plugs in here: the dense network in [`crate::nn`], the
//! [`MeanRegressor`] reference model, or an external backend.

use std::path::Path;

use anyhow::Context;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::Serialize;

use crate::error::{DepartError, Result};

// ---------------------------------------------------------------------------
// Task / dimensions / options
// ---------------------------------------------------------------------------

/// What the model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Task {
    /// One-hot targets, probability outputs decoded by arg-max.
    Classification,
    /// A single numeric output per row.
    Regression,
}

/// Input/output widths handed to a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDims {
    pub input: usize,
    pub output: usize,
}

/// Options forwarded to [`Estimator::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 512,
            shuffle: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Training history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub metric: f64,
}

/// Loss and monitored metric per epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    pub metric_name: String,
    pub records: Vec<EpochRecord>,
}

impl History {
    pub fn new(metric_name: &str) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, loss: f64, metric: f64) {
        let epoch = self.records.len() + 1;
        self.records.push(EpochRecord {
            epoch,
            loss,
            metric,
        });
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.records.last().map(|r| r.loss)
    }

    /// Write `epoch,loss,<metric>` rows.
    pub fn write_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(["epoch", "loss", self.metric_name.as_str()])?;
        for r in &self.records {
            writer.write_record([r.epoch.to_string(), r.loss.to_string(), r.metric.to_string()])?;
        }
        writer.flush().context("flushing history CSV")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A trainable model.
pub trait Estimator {
    /// Train on `features` (rows × inputs) against `targets` (rows × outputs).
    fn fit(&mut self, features: ArrayView2<f64>, targets: ArrayView2<f64>, opts: &FitOptions) -> Result<History>;

    /// Predict one output row per feature row.
    fn predict(&self, features: ArrayView2<f64>) -> Result<Array2<f64>>;
}

/// Builds a fresh, untrained estimator per fold.
pub trait ModelFactory: Sync {
    type Model: Estimator + Send;

    fn task(&self) -> Task;

    fn build(&self, dims: ModelDims, seed: u64) -> Result<Self::Model>;
}

// ---------------------------------------------------------------------------
// MeanRegressor
// ---------------------------------------------------------------------------

/// Predicts the per-column training mean for every row.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    means: Option<Array1<f64>>,
}

impl MeanRegressor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for MeanRegressor {
    fn fit(&mut self, features: ArrayView2<f64>, targets: ArrayView2<f64>, _opts: &FitOptions) -> Result<History> {
        if features.nrows() != targets.nrows() {
            return Err(DepartError::Shape(format!(
                "{} feature rows for {} target rows",
                features.nrows(),
                targets.nrows()
            )));
        }
        let means = targets
            .mean_axis(Axis(0))
            .ok_or_else(|| DepartError::Shape("cannot fit on zero rows".into()))?;

        let mut history = History::new("mse");
        let residual = &targets - &means;
        let mse = residual.mapv(|r| r * r).mean().unwrap_or(0.0);
        history.push(mse, mse);

        self.means = Some(means);
        Ok(history)
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array2<f64>> {
        let means = self
            .means
            .as_ref()
            .ok_or_else(|| DepartError::Config("predict called before fit".into()))?;
        let mut out = Array2::zeros((features.nrows(), means.len()));
        out.rows_mut().into_iter().for_each(|mut row| row.assign(means));
        Ok(out)
    }
}

/// Factory for [`MeanRegressor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanRegressorFactory;

impl ModelFactory for MeanRegressorFactory {
    type Model = MeanRegressor;

    fn task(&self) -> Task {
        Task::Regression
    }

    fn build(&self, _dims: ModelDims, _seed: u64) -> Result<MeanRegressor> {
        Ok(MeanRegressor::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mean_regressor_predicts_training_mean() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![[1.0], [2.0], [6.0]];
        let mut model = MeanRegressor::new();
        let history = model.fit(x.view(), y.view(), &FitOptions::default()).unwrap();
        assert_eq!(history.records.len(), 1);

        let pred = model.predict(array![[10.0], [20.0]].view()).unwrap();
        assert_eq!(pred, array![[3.0], [3.0]]);
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        assert!(MeanRegressor::new().predict(array![[1.0]].view()).is_err());
    }
}
