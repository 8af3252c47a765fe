use log::{info, warn};
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::data::{one_hot, LabelEncoder, PeptideTable};
use crate::error::{DepartError, Result};
use crate::estimator::{ModelDims, ModelFactory, Task};
use crate::eval::{aggregate, AggregateRow, MetricsTable};

use super::fit::{fit_and_evaluate, FitParams, FoldOutcome, SplitData};
use super::split::{Fold, KFold};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How folds are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Sequential,
    /// Fixed-size worker pool; one task per fold.
    Parallel { workers: usize },
}

/// Cross-validation settings shared by every fold.
#[derive(Debug, Clone)]
pub struct CvConfig {
    /// Method name; rows are tagged `<name>_Train` / `<name>_Test`.
    pub name: String,
    pub splitter: KFold,
    pub execution: Execution,
    /// Task is overridden by the factory's own task.
    pub params: FitParams,
}

impl CvConfig {
    pub fn new(name: &str, task: Task) -> Self {
        Self {
            name: name.to_string(),
            splitter: KFold::default(),
            execution: Execution::Parallel { workers: 5 },
            params: FitParams::new(task),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoded targets
// ---------------------------------------------------------------------------

/// Targets prepared for a task, plus the encoder needed to decode them.
#[derive(Debug, Clone)]
pub struct EncodedTargets {
    pub values: Array2<f64>,
    pub encoder: Option<LabelEncoder>,
    pub output_dim: usize,
}

impl EncodedTargets {
    /// Classification: label codes then one-hot; regression: raw N×1 values.
    pub fn encode(task: Task, fractions: &[f64]) -> Result<Self> {
        match task {
            Task::Classification => {
                let encoder = LabelEncoder::fit(fractions);
                let codes = encoder.transform(fractions)?;
                let output_dim = encoder.n_classes();
                Ok(Self {
                    values: one_hot(&codes, output_dim),
                    encoder: Some(encoder),
                    output_dim,
                })
            }
            Task::Regression => Ok(Self {
                values: Array2::from_shape_vec((fractions.len(), 1), fractions.to_vec())
                    .map_err(|e| DepartError::Shape(e.to_string()))?,
                encoder: None,
                output_dim: 1,
            }),
        }
    }

    fn rows(&self, indices: &[usize]) -> Array2<f64> {
        self.values.select(Axis(0), indices)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Output of a cross-validation run.
#[derive(Debug, Clone)]
pub struct CvReport<M> {
    /// Fold assignments, in fold order.
    pub folds: Vec<Fold>,
    /// One outcome per fold, in fold order.
    pub outcomes: Vec<FoldOutcome<M>>,
    /// All per-fold rows, in fold order.
    pub rows: MetricsTable,
    /// One row per method, sorted by method name.
    pub summary: Vec<AggregateRow>,
}

impl<M> CvReport<M> {
    /// Assemble a report from fold outcomes.
    pub fn from_outcomes(folds: Vec<Fold>, outcomes: Vec<FoldOutcome<M>>) -> Self {
        let mut rows = MetricsTable::default();
        for outcome in &outcomes {
            rows.extend(outcome.metrics.clone());
        }
        let summary = aggregate(&rows.rows);
        Self {
            folds,
            outcomes,
            rows,
            summary,
        }
    }

    /// Drop the fitted models, keeping assignments and metrics.
    pub fn into_summary(self) -> CvSummary {
        CvSummary {
            folds: self.folds,
            rows: self.rows,
            summary: self.summary,
        }
    }
}

/// Model-free view of a [`CvReport`].
#[derive(Debug, Clone)]
pub struct CvSummary {
    pub folds: Vec<Fold>,
    pub rows: MetricsTable,
    pub summary: Vec<AggregateRow>,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Run every fold through `job`, sequentially or on a dedicated pool.
///
/// Fold order is preserved in the output; the first error is returned.
pub fn run_folds<T, F>(folds: &[Fold], execution: Execution, job: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&Fold) -> Result<T> + Sync + Send,
{
    match execution {
        Execution::Sequential => folds.iter().map(&job).collect(),
        Execution::Parallel { workers } => {
            if workers == 0 {
                return Err(DepartError::Config("parallel execution needs at least one worker".into()));
            }
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("depart-fold-{i}"))
                .build()?;
            pool.install(|| folds.par_iter().map(&job).collect())
        }
    }
}

/// K-fold cross-validation of models built by `factory` on `table`.
pub fn cross_validate<F: ModelFactory>(table: &PeptideTable, factory: &F, config: &CvConfig) -> Result<CvReport<F::Model>> {
    let task = factory.task();
    let mut params = config.params;
    if params.task != task {
        warn!("fit task {:?} overridden by factory task {task:?}", params.task);
        params.task = task;
    }

    let targets = EncodedTargets::encode(task, &table.fractions)?;
    let dims = ModelDims {
        input: table.n_features(),
        output: targets.output_dim,
    };
    let folds = config.splitter.split(table.len())?;
    info!(
        "cross-validating '{}' on {} rows x {} features: {} folds, {:?}, output dim {}",
        config.name,
        table.len(),
        dims.input,
        folds.len(),
        config.execution,
        dims.output
    );

    let run_fold = |fold: &Fold| -> Result<FoldOutcome<F::Model>> {
        let model = factory.build(dims, config.splitter.seed.wrapping_add(fold.index as u64))?;
        let data = SplitData {
            train_x: table.feature_rows(&fold.train),
            test_x: table.feature_rows(&fold.test),
            train_y: targets.rows(&fold.train),
            test_y: targets.rows(&fold.test),
        };
        let outcome = fit_and_evaluate(model, data, &config.name, &params, targets.encoder.as_ref())?;
        info!(
            "fold {} done ({} train / {} test rows)",
            fold.index,
            fold.train.len(),
            fold.test.len()
        );
        Ok(outcome)
    };

    let outcomes = run_folds(&folds, config.execution, run_fold)?;
    Ok(CvReport::from_outcomes(folds, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_targets_pass_through() {
        let t = EncodedTargets::encode(Task::Regression, &[1.5, 2.0]).unwrap();
        assert_eq!(t.output_dim, 1);
        assert_eq!(t.values.column(0).to_vec(), vec![1.5, 2.0]);
        assert!(t.encoder.is_none());
    }

    #[test]
    fn classification_targets_are_one_hot() {
        let t = EncodedTargets::encode(Task::Classification, &[2.0, 5.0, 2.0, 9.0]).unwrap();
        assert_eq!(t.output_dim, 3);
        assert_eq!(t.values.row(1).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn run_folds_preserves_order_and_propagates_errors() {
        let folds = KFold::new(4, true, 1).split(20).unwrap();
        let seq = run_folds(&folds, Execution::Sequential, |f| Ok(f.index)).unwrap();
        let par = run_folds(&folds, Execution::Parallel { workers: 3 }, |f| Ok(f.index)).unwrap();
        assert_eq!(seq, vec![0, 1, 2, 3]);
        assert_eq!(seq, par);

        let failed = run_folds(&folds, Execution::Parallel { workers: 2 }, |f| {
            if f.index == 2 {
                Err(DepartError::Shape("boom".into()))
            } else {
                Ok(f.index)
            }
        });
        assert!(failed.is_err());
        assert!(run_folds(&folds, Execution::Parallel { workers: 0 }, |f| Ok(f.index)).is_err());
    }
}
