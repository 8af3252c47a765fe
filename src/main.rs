use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use depart::data::loader::load_file;
use depart::eval::write_aggregate_csv;
use depart::nn::ActivationRegistry;
use depart::{Method, MetricSet, PeptideTable, RunConfig};

/// Cross-validated peptide fraction prediction.
#[derive(Debug, Parser)]
#[command(name = "depart", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// K-fold cross-validation on one table.
    Cv(CvArgs),
    /// Train on one table and evaluate once on another.
    Holdout(HoldoutArgs),
    /// Print the metric column labels.
    Names,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Classifier,
    Regressor,
    Baseline,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// JSON run configuration; defaults are used for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = MethodArg::Classifier)]
    method: MethodArg,
    #[arg(long)]
    epochs: Option<usize>,
    /// Write the result CSV here instead of stdout.
    #[arg(long, short)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CvArgs {
    /// Training table (.csv, .json or .parquet).
    #[arg(long)]
    train: PathBuf,
    #[command(flatten)]
    run: RunArgs,
    #[arg(long)]
    folds: Option<usize>,
    /// Worker count; 1 runs the folds sequentially.
    #[arg(long)]
    jobs: Option<usize>,
    /// Also write the per-fold metric rows.
    #[arg(long)]
    rows_out: Option<PathBuf>,
    /// Also write the fold assignments as JSON.
    #[arg(long)]
    folds_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct HoldoutArgs {
    #[arg(long)]
    train: PathBuf,
    #[arg(long)]
    valid: PathBuf,
    #[command(flatten)]
    run: RunArgs,
    /// Write the per-epoch training history as CSV.
    #[arg(long)]
    history: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Cv(args) => run_cv(args),
        Command::Holdout(args) => run_holdout(args),
        Command::Names => {
            println!("{}", MetricSet::names().join(","));
            Ok(())
        }
    }
}

fn run_cv(args: CvArgs) -> Result<()> {
    let mut config = load_config(&args.run)?;
    if let Some(folds) = args.folds {
        config.folds = folds;
    }
    if let Some(jobs) = args.jobs {
        config.n_jobs = jobs;
        config.parallel = jobs > 1;
    }
    let method = select_method(args.run.method, &config);
    let table = load_table(&args.train)?;

    let summary = method
        .cross_validate(&table, &config, &ActivationRegistry::default())
        .with_context(|| format!("cross-validating {method} on {}", args.train.display()))?;

    if let Some(path) = &args.rows_out {
        summary.rows.write_csv(create(path)?)?;
        info!("per-fold rows written to {}", path.display());
    }
    if let Some(path) = &args.folds_out {
        serde_json::to_writer_pretty(create(path)?, &summary.folds)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("fold assignments written to {}", path.display());
    }
    write_aggregate_csv(&summary.summary, output(args.run.out.as_deref())?)
}

fn run_holdout(args: HoldoutArgs) -> Result<()> {
    let config = load_config(&args.run)?;
    let method = select_method(args.run.method, &config);
    let train = load_table(&args.train)?;
    let valid = load_table(&args.valid)?;

    let summary = method
        .train_validation(&train, &valid, &config, &ActivationRegistry::default())
        .with_context(|| format!("training {method} on {}", args.train.display()))?;

    if let Some(path) = &args.history {
        summary.history.write_csv(path)?;
        info!("training history written to {}", path.display());
    }
    summary.metrics.write_csv(output(args.run.out.as_deref())?)
}

fn load_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    Ok(config)
}

fn select_method(arg: MethodArg, config: &RunConfig) -> Method {
    match arg {
        MethodArg::Classifier => Method::classifier(config),
        MethodArg::Regressor => Method::regressor(config),
        MethodArg::Baseline => Method::baseline(config),
    }
}

fn load_table(path: &Path) -> Result<PeptideTable> {
    let frame = load_file(path)?;
    let table = PeptideTable::from_frame(&frame)
        .with_context(|| format!("building peptide table from {}", path.display()))?;
    info!(
        "{}: {} peptides, {} features, {} fractions",
        path.display(),
        table.len(),
        table.n_features(),
        table.n_fractions()
    );
    Ok(table)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(create(path)?),
        None => Box::new(io::stdout().lock()),
    })
}
