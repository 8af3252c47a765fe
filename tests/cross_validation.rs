use std::io::Write;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use depart::baseline::{cross_validate_baseline, BaselineConfig};
use depart::cv::{cross_validate, CvConfig, Execution, KFold};
use depart::data::loader::load_file;
use depart::estimator::{MeanRegressorFactory, Task};
use depart::eval::{EvalOptions, Metric};
use depart::nn::{ActivationRegistry, NetworkConfig, NeuralFactory};
use depart::{Method, PeptideTable, RunConfig};

fn random_table(n_rows: usize, n_features: usize, seed: u64) -> PeptideTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let residues: Vec<char> = "ACDEFGHIKLMNPQRSTVWY".chars().collect();
    let sequences: Vec<String> = (0..n_rows)
        .map(|_| {
            let len: usize = rng.gen_range(6..14);
            (0..len)
                .map(|_| residues[rng.gen_range(0..residues.len())])
                .collect::<String>()
        })
        .collect();
    let fractions: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(1..=5i64) as f64).collect();
    let features = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>());
    let names = (0..n_features).map(|j| format!("feature_{j}")).collect();
    PeptideTable::new(sequences, fractions, names, features).unwrap()
}

#[test]
fn mean_regressor_cannot_beat_the_test_mean() {
    let table = random_table(100, 10, 7);
    let config = CvConfig::new("Mean", Task::Regression);
    let report = cross_validate(&table, &MeanRegressorFactory, &config).unwrap();

    assert_eq!(report.folds.len(), 5);
    assert_eq!(report.rows.len(), 10);
    for row in &report.rows.rows {
        assert!(row.metrics.mse >= 0.0);
        if row.method == "Mean_Test" {
            assert!(row.metrics.r2 <= 1e-12, "test R2 {}", row.metrics.r2);
        }
    }

    let methods: Vec<&str> = report.summary.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["Mean_Test", "Mean_Train"]);
    for row in &report.summary {
        assert_eq!(row.folds, 5);
        let band = row.max_acc - row.min_acc;
        assert!((band - 2.0 * row.sem_of(Metric::ExactMatch)).abs() < 1e-9);
    }
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let table = random_table(60, 4, 11);
    let mut config = CvConfig::new("Mean", Task::Regression);
    config.execution = Execution::Sequential;
    let sequential = cross_validate(&table, &MeanRegressorFactory, &config).unwrap();
    config.execution = Execution::Parallel { workers: 3 };
    let parallel = cross_validate(&table, &MeanRegressorFactory, &config).unwrap();

    assert_eq!(sequential.folds, parallel.folds);
    let seq_methods: Vec<_> = sequential.rows.rows.iter().map(|r| r.method.clone()).collect();
    let par_methods: Vec<_> = parallel.rows.rows.iter().map(|r| r.method.clone()).collect();
    assert_eq!(seq_methods, par_methods);
    for (a, b) in sequential.rows.rows.iter().zip(&parallel.rows.rows) {
        assert_eq!(a.metrics.mae, b.metrics.mae);
    }
}

#[test]
fn classifier_network_runs_every_fold() {
    let table = random_table(50, 6, 3);
    let factory = NeuralFactory::classifier(
        NetworkConfig {
            neurons: vec![8, 6, 4],
            ..NetworkConfig::default()
        },
        ActivationRegistry::default(),
    );
    let mut config = CvConfig::new("FNN", Task::Classification);
    config.splitter = KFold::new(3, true, 42);
    config.params.fit.epochs = 3;
    config.params.fit.batch_size = 16;
    config.params.return_predictions = true;

    let report = cross_validate(&table, &factory, &config).unwrap();
    assert_eq!(report.outcomes.len(), 3);
    for (fold, outcome) in report.folds.iter().zip(&report.outcomes) {
        assert_eq!(outcome.history.records.len(), 3);
        let predictions = outcome.predictions.as_ref().unwrap();
        assert_eq!(predictions.test.len(), fold.test.len());
        assert!(predictions.test.iter().all(|p| (1.0..=5.0).contains(p)));
    }
}

#[test]
fn baseline_cross_validation_uses_sequences() {
    let table = random_table(80, 2, 5);
    let config = BaselineConfig {
        strict: false,
        ..BaselineConfig::default()
    };
    let report = cross_validate_baseline(
        &table,
        &config,
        "RC",
        &KFold::default(),
        Execution::Parallel { workers: 2 },
        EvalOptions::default(),
        false,
    )
    .unwrap();
    assert_eq!(report.rows.len(), 10);
    assert!(report.outcomes.iter().all(|o| (-1.0..=1.0).contains(&o.model.lcp)));
}

#[test]
fn csv_file_to_holdout_report() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Sequence,Modified sequence,Fraction,Score,hydro,length").unwrap();
    for i in 0..30 {
        let fraction = i % 3 + 1;
        writeln!(
            file,
            "PEPT{}IDEK,_PEPTIDE_,{fraction},{}.5,{},{}",
            "A".repeat(i % 4),
            50 + i,
            fraction as f64 * 0.7,
            8 + i % 4
        )
        .unwrap();
    }
    file.flush().unwrap();

    let table = PeptideTable::from_frame(&load_file(file.path()).unwrap()).unwrap();
    assert_eq!(table.feature_names, vec!["hydro", "length"]);
    assert_eq!(table.n_fractions(), 3);

    let run = RunConfig {
        epochs: 2,
        network: NetworkConfig {
            neurons: vec![4, 4, 4],
            ..NetworkConfig::default()
        },
        ..RunConfig::default()
    };
    let summary = Method::regressor(&run)
        .train_validation(&table, &table, &run, &ActivationRegistry::default())
        .unwrap();
    let labels: Vec<&str> = summary.metrics.rows.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(labels, vec!["FNN_Train", "FNN_Valid"]);
}
