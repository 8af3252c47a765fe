//! Cross-validated peptide fraction prediction.
//!
//! ```text
//!  file ──► data::loader ──► Frame ──► PeptideTable
//!                                          │
//!                       Method ────────────┤
//!        (baseline | classifier | regressor)
//!                                          ▼
//!                       cv::cross_validate / cv::train_validation
//!                                          │
//!                                          ▼
//!                          eval::MetricsTable ──► eval::aggregate
//! ```

pub mod baseline;
pub mod config;
pub mod cv;
pub mod data;
pub mod error;
pub mod estimator;
pub mod eval;
pub mod method;
pub mod nn;

pub use config::RunConfig;
pub use cv::{cross_validate, train_validation, CvConfig, CvReport, CvSummary, Execution, KFold};
pub use data::PeptideTable;
pub use error::{DepartError, Result};
pub use estimator::{Estimator, ModelFactory, Task};
pub use eval::{aggregate, AggregateRow, MetricSet, MetricsTable};
pub use method::{HoldoutSummary, Method};
