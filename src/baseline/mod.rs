//! Additive retention-coefficient reference model.
//!
//! Works on sequences only; the numeric feature matrix of the table is not
//! used. `Fraction` serves as the retention target.

pub mod additive;
pub mod sequence;

pub use additive::{BaselineConfig, RetentionModel};
pub use sequence::{unmodified, SequenceRules};

use log::info;

use crate::cv::{run_folds, CvReport, Execution, Fold, FoldOutcome, HoldoutReport, KFold, Predictions};
use crate::data::PeptideTable;
use crate::error::Result;
use crate::estimator::History;
use crate::eval::metrics::pearson;
use crate::eval::{EvalOptions, MetricSet, MetricsTable};

/// Fit the baseline on one split and score it on both sides.
///
/// The history holds a single record: training MSE and training correlation.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_baseline(
    train_sequences: &[String],
    train_times: &[f64],
    test_sequences: &[String],
    test_times: &[f64],
    name: &str,
    config: &BaselineConfig,
    eval: EvalOptions,
    return_predictions: bool,
) -> Result<FoldOutcome<RetentionModel>> {
    let model = RetentionModel::fit(train_sequences, train_times, config)?;
    let train_pred = model.predict_all(train_sequences)?;
    let test_pred = model.predict_all(test_sequences)?;

    let train_metrics = MetricSet::evaluate(train_times, &train_pred, eval)?;
    let mut history = History::new("correlation");
    history.push(train_metrics.mse, pearson(train_times, &train_pred));

    let mut metrics = MetricsTable::default();
    metrics.push(format!("{name}_Train"), train_metrics);
    metrics.push(
        format!("{name}_Test"),
        MetricSet::evaluate(test_times, &test_pred, eval)?,
    );

    let predictions = return_predictions.then(|| Predictions {
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

/// K-fold cross-validation of the baseline, with the same splitter and
/// aggregation as the neural models.
pub fn cross_validate_baseline(
    table: &PeptideTable,
    config: &BaselineConfig,
    name: &str,
    splitter: &KFold,
    execution: Execution,
    eval: EvalOptions,
    return_predictions: bool,
) -> Result<CvReport<RetentionModel>> {
    let folds = splitter.split(table.len())?;
    info!(
        "cross-validating baseline '{name}' on {} sequences: {} folds, {:?}",
        table.len(),
        folds.len(),
        execution
    );

    let outcomes = run_folds(&folds, execution, |fold: &Fold| {
        let outcome = evaluate_baseline(
            &table.sequence_rows(&fold.train),
            &table.fraction_rows(&fold.train),
            &table.sequence_rows(&fold.test),
            &table.fraction_rows(&fold.test),
            name,
            config,
            eval,
            return_predictions,
        )?;
        info!("fold {} done (lcp {:.3})", fold.index, outcome.model.lcp);
        Ok(outcome)
    })?;
    Ok(CvReport::from_outcomes(folds, outcomes))
}

/// Fit the baseline on the full training table and score it once on a
/// validation table.
pub fn train_validation_baseline(
    train: &PeptideTable,
    valid: &PeptideTable,
    name: &str,
    config: &BaselineConfig,
    eval: EvalOptions,
) -> Result<HoldoutReport<RetentionModel>> {
    info!(
        "fitting baseline '{name}' on {} sequences, validating on {}",
        train.len(),
        valid.len()
    );
    let model = RetentionModel::fit(&train.sequences, &train.fractions, config)?;
    let train_pred = model.predict_all(&train.sequences)?;
    let valid_pred = model.predict_all(&valid.sequences)?;

    let train_metrics = MetricSet::evaluate(&train.fractions, &train_pred, eval)?;
    let mut history = History::new("correlation");
    history.push(train_metrics.mse, pearson(&train.fractions, &train_pred));

    let mut metrics = MetricsTable::default();
    metrics.push(format!("{name}_Train"), train_metrics);
    metrics.push(
        format!("{name}_Valid"),
        MetricSet::evaluate(&valid.fractions, &valid_pred, eval)?,
    );
    Ok(HoldoutReport {
        metrics,
        model,
        history,
    })
}
