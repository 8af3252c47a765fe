use log::info;

use crate::data::PeptideTable;
use crate::error::{DepartError, Result};
use crate::estimator::{Estimator, History, ModelDims, ModelFactory};
use crate::eval::{MetricSet, MetricsTable};

use super::fit::{decode, scale_pair, FitParams};
use super::runner::EncodedTargets;

/// Result of [`train_validation`].
#[derive(Debug, Clone)]
pub struct HoldoutReport<M> {
    /// `<name>_Train` and `<name>_Valid` rows.
    pub metrics: MetricsTable,
    pub model: M,
    pub history: History,
}

/// Train one model on the full training table and score it once on a
/// held-out validation table.
///
/// Validation labels are compared as-is against decoded predictions, so they
/// need not all occur in the training table.
pub fn train_validation<F: ModelFactory>(
    train: &PeptideTable,
    valid: &PeptideTable,
    factory: &F,
    name: &str,
    params: &FitParams,
    seed: u64,
) -> Result<HoldoutReport<F::Model>> {
    if train.feature_names != valid.feature_names {
        return Err(DepartError::Shape(format!(
            "validation features {:?} differ from training features {:?}",
            valid.feature_names, train.feature_names
        )));
    }
    let task = factory.task();
    let targets = EncodedTargets::encode(task, &train.fractions)?;
    let dims = ModelDims {
        input: train.n_features(),
        output: targets.output_dim,
    };
    info!(
        "training '{name}' on {} rows, validating on {} rows",
        train.len(),
        valid.len()
    );

    let (train_x, valid_x) = scale_pair(train.features.clone(), valid.features.clone(), params.scale)?;

    let mut model = factory.build(dims, seed)?;
    let history = model.fit(train_x.view(), targets.values.view(), &params.fit)?;
    if let Some(loss) = history.final_loss() {
        info!("final training loss {loss:.5}");
    }

    let encoder = targets.encoder.as_ref();
    let train_pred = decode(task, model.predict(train_x.view())?.view(), encoder)?;
    let valid_pred = decode(task, model.predict(valid_x.view())?.view(), encoder)?;

    let mut metrics = MetricsTable::default();
    metrics.push(
        format!("{name}_Train"),
        MetricSet::evaluate(&train.fractions, &train_pred, params.eval)?,
    );
    metrics.push(
        format!("{name}_Valid"),
        MetricSet::evaluate(&valid.fractions, &valid_pred, params.eval)?,
    );

    Ok(HoldoutReport {
        metrics,
        model,
        history,
    })
}
