use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Errors raised by the modelling, evaluation and cross-validation layers.
///
/// File loading stays on `anyhow` (see [`crate::data::loader`]); everything
/// that operates on an already-built [`crate::data::PeptideTable`] reports
/// through this enum.
#[derive(Debug, Error)]
pub enum DepartError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}', row {row}: {reason}")]
    InvalidCell {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown activation '{0}'")]
    UnknownActivation(String),

    #[error("label {0} was not seen when the encoder was fitted")]
    UnknownLabel(f64),

    #[error("no retention coefficient for '{residue}' in sequence '{sequence}'")]
    UnknownResidue { residue: String, sequence: String },

    #[error("empty peptide sequence")]
    EmptySequence,

    #[error("training diverged at epoch {0}")]
    Diverged(usize),

    #[error("least-squares solve failed: {0}")]
    Solve(String),

    #[error("cannot evaluate predictions: {0}")]
    Metrics(String),

    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, DepartError>;
