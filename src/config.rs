use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineConfig;
use crate::cv::{CvConfig, Execution, FitParams, KFold};
use crate::estimator::{FitOptions, Task};
use crate::eval::EvalOptions;
use crate::nn::NetworkConfig;

/// Settings of one run, read from a JSON file. Every field is optional.
///
/// ```json
/// { "name": "FNN", "folds": 5, "epochs": 50,
///   "network": { "neurons": [64, 32, 16] } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub folds: usize,
    pub seed: u64,
    pub shuffle: bool,
    pub n_jobs: usize,
    pub parallel: bool,
    pub epochs: usize,
    pub batch_size: usize,
    pub scale: bool,
    pub auc: bool,
    pub return_predictions: bool,
    pub network: NetworkConfig,
    pub baseline: BaselineConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "FNN".to_string(),
            folds: 5,
            seed: 42,
            shuffle: true,
            n_jobs: 5,
            parallel: true,
            epochs: 100,
            batch_size: 512,
            scale: false,
            auc: false,
            return_predictions: false,
            network: NetworkConfig::default(),
            baseline: BaselineConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!("loaded run config '{}' from {}", config.name, path.display());
        Ok(config)
    }

    pub fn splitter(&self) -> KFold {
        KFold::new(self.folds, self.shuffle, self.seed)
    }

    pub fn execution(&self) -> Execution {
        if self.parallel {
            Execution::Parallel { workers: self.n_jobs }
        } else {
            Execution::Sequential
        }
    }

    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions { auc: self.auc }
    }

    pub fn fit_params(&self, task: Task) -> FitParams {
        FitParams {
            task,
            fit: FitOptions {
                epochs: self.epochs,
                batch_size: self.batch_size,
                shuffle: true,
            },
            scale: self.scale,
            return_predictions: self.return_predictions,
            eval: self.eval_options(),
        }
    }

    pub fn cv_config(&self, task: Task) -> CvConfig {
        CvConfig {
            name: self.name.clone(),
            splitter: self.splitter(),
            execution: self.execution(),
            params: self.fit_params(task),
        }
    }
}
