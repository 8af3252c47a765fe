use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::data::{argmax_rows, LabelEncoder, StandardScaler};
use crate::error::Result;
use crate::estimator::{Estimator, FitOptions, History, Task};
use crate::eval::{EvalOptions, MetricSet, MetricsTable};

/// Train/test matrices of one split. Targets are already encoded
/// (one-hot for classification, N×1 values for regression).
#[derive(Debug, Clone)]
pub struct SplitData {
    pub train_x: Array2<f64>,
    pub test_x: Array2<f64>,
    pub train_y: Array2<f64>,
    pub test_y: Array2<f64>,
}

/// How a split is fitted and scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub task: Task,
    pub fit: FitOptions,
    /// Standardise features with train-split statistics.
    pub scale: bool,
    pub return_predictions: bool,
    pub eval: EvalOptions,
}

impl FitParams {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            fit: FitOptions::default(),
            scale: false,
            return_predictions: false,
            eval: EvalOptions::default(),
        }
    }
}

/// Decoded predictions of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predictions {
    pub train: Vec<f64>,
    pub test: Vec<f64>,
}

/// Everything one fit produces.
#[derive(Debug, Clone)]
pub struct FoldOutcome<M> {
    pub model: M,
    /// `<name>_Train` and `<name>_Test` rows.
    pub metrics: MetricsTable,
    pub history: History,
    pub predictions: Option<Predictions>,
}

/// Fit `model` on the train split and score it on both splits.
///
/// Classification outputs are reduced by arg-max; when `labels` is given the
/// class codes are mapped back to fraction labels before scoring.
pub fn fit_and_evaluate<M: Estimator>(
    mut model: M,
    data: SplitData,
    name: &str,
    params: &FitParams,
    labels: Option<&LabelEncoder>,
) -> Result<FoldOutcome<M>> {
    let (train_x, test_x) = scale_pair(data.train_x, data.test_x, params.scale)?;

    let history = model.fit(train_x.view(), data.train_y.view(), &params.fit)?;

    let train_out = model.predict(train_x.view())?;
    let test_out = model.predict(test_x.view())?;

    let train_true = decode(params.task, data.train_y.view(), labels)?;
    let train_pred = decode(params.task, train_out.view(), labels)?;
    let test_true = decode(params.task, data.test_y.view(), labels)?;
    let test_pred = decode(params.task, test_out.view(), labels)?;

    let mut metrics = MetricsTable::default();
    metrics.push(
        format!("{name}_Train"),
        MetricSet::evaluate(&train_true, &train_pred, params.eval)?,
    );
    metrics.push(
        format!("{name}_Test"),
        MetricSet::evaluate(&test_true, &test_pred, params.eval)?,
    );

    let predictions = params.return_predictions.then(|| Predictions {
        train: train_pred,
        test: test_pred,
    });

    Ok(FoldOutcome {
        model,
        metrics,
        history,
        predictions,
    })
}

/// Optionally standardise both matrices with statistics of the first.
pub(crate) fn scale_pair(train: Array2<f64>, other: Array2<f64>, scale: bool) -> Result<(Array2<f64>, Array2<f64>)> {
    if !scale {
        return Ok((train, other));
    }
    let scaler = StandardScaler::fit(train.view())?;
    Ok((scaler.transform(train.view())?, scaler.transform(other.view())?))
}

/// Flatten model outputs (or encoded targets) into one value per row.
pub(crate) fn decode(task: Task, values: ArrayView2<f64>, labels: Option<&LabelEncoder>) -> Result<Vec<f64>> {
    match task {
        Task::Classification => {
            let codes = argmax_rows(values);
            match labels {
                Some(encoder) => encoder.inverse_transform(&codes),
                None => Ok(codes.into_iter().map(|c| c as f64).collect()),
            }
        }
        Task::Regression => Ok(values.iter().copied().collect()),
    }
}
