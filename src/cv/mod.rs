//! Cross-validation harness.
//!
//! ```text
//!  PeptideTable ──► EncodedTargets ──► KFold::split
//!                                          │ one task per fold
//!                                          ▼
//!                     factory.build ─► fit_and_evaluate ─► FoldOutcome
//!                                          │ gathered in fold order
//!                                          ▼
//!                                  aggregate ─► CvReport
//! ```

pub mod fit;
pub mod holdout;
pub mod runner;
pub mod split;

pub use fit::{fit_and_evaluate, FitParams, FoldOutcome, Predictions, SplitData};
pub use holdout::{train_validation, HoldoutReport};
pub use runner::{cross_validate, run_folds, CvConfig, CvReport, CvSummary, EncodedTargets, Execution};
pub use split::{Fold, KFold};
