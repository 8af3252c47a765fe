use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use anyhow::Context;
use serde::Serialize;

use super::metrics::{Metric, MetricSet, METHOD_LABEL};

// ---------------------------------------------------------------------------
// Per-split rows
// ---------------------------------------------------------------------------

/// One row of a metrics table: the battery for one method/split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub method: String,
    pub metrics: MetricSet,
}

/// Rows in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsTable {
    pub rows: Vec<MetricRow>,
}

impl MetricsTable {
    pub fn push(&mut self, method: impl Into<String>, metrics: MetricSet) {
        self.rows.push(MetricRow {
            method: method.into(),
            metrics,
        });
    }

    pub fn extend(&mut self, other: MetricsTable) {
        self.rows.extend(other.rows);
    }

    pub fn get(&self, method: &str) -> Option<&MetricSet> {
        self.rows.iter().find(|r| r.method == method).map(|r| &r.metrics)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CSV with the battery labels as header, values rounded to 3 decimals.
    pub fn write_csv<W: Write>(&self, out: W) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(MetricSet::names())?;
        for row in &self.rows {
            let mut record: Vec<String> = row.metrics.values().iter().map(|v| fmt3(*v)).collect();
            record.push(row.method.clone());
            writer.write_record(&record)?;
        }
        writer.flush().context("flushing metrics CSV")?;
        Ok(())
    }
}

impl fmt::Display for MetricsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}", row.method)?;
            for metric in Metric::ALL {
                writeln!(f, "  {:<14} {}", metric.label(), fmt3(row.metrics.get(metric)))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregation across folds
// ---------------------------------------------------------------------------

/// Fold-level rows of one method collapsed to mean and standard error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub method: String,
    /// Part of the method name before the first `_`.
    pub classifier: String,
    /// Part after the first `_` (`Train`, `Test`, `Valid`).
    pub data: String,
    pub folds: usize,
    pub mean: [f64; 14],
    pub sem: [f64; 14],
    pub min_acc: f64,
    pub max_acc: f64,
    pub diff: f64,
}

impl AggregateRow {
    pub fn mean_of(&self, metric: Metric) -> f64 {
        self.mean[metric_index(metric)]
    }

    pub fn sem_of(&self, metric: Metric) -> f64 {
        self.sem[metric_index(metric)]
    }
}

fn metric_index(metric: Metric) -> usize {
    Metric::ALL.iter().position(|m| *m == metric).unwrap_or(0)
}

/// Group rows by method name (sorted) and compute mean / standard error of
/// every metric. NaN values are skipped; fewer than two values give a NaN
/// standard error.
pub fn aggregate(rows: &[MetricRow]) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<&str, Vec<&MetricSet>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.method.as_str()).or_default().push(&row.metrics);
    }

    groups
        .into_iter()
        .map(|(method, sets)| {
            let mut mean = [f64::NAN; 14];
            let mut sem = [f64::NAN; 14];
            for (i, metric) in Metric::ALL.iter().enumerate() {
                let values: Vec<f64> = sets.iter().map(|s| s.get(*metric)).collect();
                (mean[i], sem[i]) = mean_sem(&values);
            }
            let exact = metric_index(Metric::ExactMatch);
            let min_acc = mean[exact] - sem[exact];
            let max_acc = mean[exact] + sem[exact];
            let (classifier, data) = method.split_once('_').unwrap_or((method, ""));
            AggregateRow {
                method: method.to_string(),
                classifier: classifier.to_string(),
                data: data.to_string(),
                folds: sets.len(),
                mean,
                sem,
                min_acc,
                max_acc,
                diff: max_acc - min_acc,
            }
        })
        .collect()
}

/// Mean and standard error of the mean (ddof = 1), skipping NaN.
pub fn mean_sem(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = finite.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = finite.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, (var / n as f64).sqrt())
}

/// Write aggregate rows as CSV: method columns, `<metric> mean` /
/// `<metric> sem` pairs, then the accuracy band.
pub fn write_aggregate_csv<W: Write>(rows: &[AggregateRow], out: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header: Vec<String> = vec![METHOD_LABEL.to_string(), "Classifier".into(), "data".into(), "folds".into()];
    for metric in Metric::ALL {
        header.push(format!("{} mean", metric.label()));
        header.push(format!("{} sem", metric.label()));
    }
    header.extend(["min_acc", "max_acc", "diff"].map(String::from));
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.method.clone(),
            row.classifier.clone(),
            row.data.clone(),
            row.folds.to_string(),
        ];
        for i in 0..Metric::ALL.len() {
            record.push(fmt3(row.mean[i]));
            record.push(fmt3(row.sem[i]));
        }
        record.extend([row.min_acc, row.max_acc, row.diff].map(fmt3));
        writer.write_record(&record)?;
    }
    writer.flush().context("flushing aggregate CSV")?;
    Ok(())
}

fn fmt3(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v:.3}")
    }
}
