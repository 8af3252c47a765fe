//! Metrics battery and fold aggregation.

pub mod metrics;
pub mod report;

pub use metrics::{EvalOptions, Metric, MetricSet};
pub use report::{aggregate, write_aggregate_csv, AggregateRow, MetricRow, MetricsTable};
