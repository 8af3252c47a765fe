//! Explicit method selection.

use std::fmt;

use log::info;

use crate::baseline::{cross_validate_baseline, train_validation_baseline, BaselineConfig};
use crate::config::RunConfig;
use crate::cv::{cross_validate, train_validation, CvSummary};
use crate::data::PeptideTable;
use crate::error::Result;
use crate::estimator::{History, ModelFactory};
use crate::eval::MetricsTable;
use crate::nn::{ActivationRegistry, NetworkConfig, NeuralFactory};

/// A model family the harness can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    /// Additive retention coefficients fitted on sequences.
    Baseline(BaselineConfig),
    NeuralClassifier(NetworkConfig),
    NeuralRegressor(NetworkConfig),
}

/// Metrics and training history of a holdout run, without the model.
#[derive(Debug, Clone)]
pub struct HoldoutSummary {
    pub metrics: MetricsTable,
    pub history: History,
}

impl Method {
    pub fn baseline(run: &RunConfig) -> Self {
        Method::Baseline(run.baseline.clone())
    }

    pub fn classifier(run: &RunConfig) -> Self {
        Method::NeuralClassifier(run.network.clone())
    }

    pub fn regressor(run: &RunConfig) -> Self {
        Method::NeuralRegressor(run.network.clone())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Method::Baseline(_) => "baseline",
            Method::NeuralClassifier(_) => "classifier",
            Method::NeuralRegressor(_) => "regressor",
        }
    }

    /// K-fold cross-validation on `table` with the run's splitter and
    /// execution settings.
    pub fn cross_validate(&self, table: &PeptideTable, run: &RunConfig, registry: &ActivationRegistry) -> Result<CvSummary> {
        info!("method {self}: {} folds, seed {}", run.folds, run.seed);
        let factory = match self {
            Method::Baseline(cfg) => {
                let report = cross_validate_baseline(
                    table,
                    cfg,
                    &run.name,
                    &run.splitter(),
                    run.execution(),
                    run.eval_options(),
                    run.return_predictions,
                )?;
                return Ok(report.into_summary());
            }
            Method::NeuralClassifier(cfg) => NeuralFactory::classifier(cfg.clone(), registry.clone()),
            Method::NeuralRegressor(cfg) => NeuralFactory::regressor(cfg.clone(), registry.clone()),
        };
        let config = run.cv_config(factory.task());
        Ok(cross_validate(table, &factory, &config)?.into_summary())
    }

    /// Train on all of `train` and evaluate once on `valid`.
    pub fn train_validation(
        &self,
        train: &PeptideTable,
        valid: &PeptideTable,
        run: &RunConfig,
        registry: &ActivationRegistry,
    ) -> Result<HoldoutSummary> {
        let factory = match self {
            Method::Baseline(cfg) => {
                let report = train_validation_baseline(train, valid, &run.name, cfg, run.eval_options())?;
                return Ok(HoldoutSummary {
                    metrics: report.metrics,
                    history: report.history,
                });
            }
            Method::NeuralClassifier(cfg) => NeuralFactory::classifier(cfg.clone(), registry.clone()),
            Method::NeuralRegressor(cfg) => NeuralFactory::regressor(cfg.clone(), registry.clone()),
        };
        let params = run.fit_params(factory.task());
        let report = train_validation(train, valid, &factory, &run.name, &params, run.seed)?;
        Ok(HoldoutSummary {
            metrics: report.metrics,
            history: report.history,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn table(n: usize) -> PeptideTable {
        let residues = ["AK", "LK", "GK", "ALK", "GGK", "LLK", "AGK", "LGK"];
        let sequences: Vec<String> = (0..n).map(|i| residues[i % residues.len()].to_string()).collect();
        let fractions: Vec<f64> = (0..n).map(|i| (i % 3 + 1) as f64).collect();
        let features = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 2)) % 7) as f64);
        PeptideTable::new(sequences, fractions, vec!["f0".into(), "f1".into()], features).unwrap()
    }

    fn quick_run() -> RunConfig {
        RunConfig {
            folds: 3,
            epochs: 2,
            parallel: false,
            network: NetworkConfig {
                neurons: vec![4, 3, 2],
                ..NetworkConfig::default()
            },
            ..RunConfig::default()
        }
    }

    #[test]
    fn labels_name_the_family() {
        let run = RunConfig::default();
        assert_eq!(Method::baseline(&run).to_string(), "baseline");
        assert_eq!(Method::classifier(&run).label(), "classifier");
        assert_eq!(Method::regressor(&run).label(), "regressor");
    }

    #[test]
    fn every_method_cross_validates() {
        let run = quick_run();
        let registry = ActivationRegistry::default();
        let data = table(24);
        for method in [Method::baseline(&run), Method::classifier(&run), Method::regressor(&run)] {
            let summary = method.cross_validate(&data, &run, &registry).unwrap();
            assert_eq!(summary.folds.len(), 3);
            assert_eq!(summary.rows.len(), 6);
            assert_eq!(summary.summary.len(), 2);
        }
    }

    #[test]
    fn holdout_rows_are_train_and_valid() {
        let run = quick_run();
        let registry = ActivationRegistry::default();
        let summary = Method::classifier(&run)
            .train_validation(&table(20), &table(8), &run, &registry)
            .unwrap();
        assert!(summary.metrics.get("FNN_Train").is_some());
        assert!(summary.metrics.get("FNN_Valid").is_some());
        assert_eq!(summary.history.records.len(), 2);
    }
}
