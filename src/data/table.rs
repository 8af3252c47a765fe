use ndarray::{Array2, Axis};

use crate::error::{DepartError, Result};

use super::model::Frame;

/// Peptide identifier column.
pub const SEQUENCE: &str = "Sequence";
/// Target column: fraction class or retention value.
pub const FRACTION: &str = "Fraction";
/// Optional identification score column.
pub const SCORE: &str = "Score";

/// Columns that never become features.
pub const IDENTIFIER_COLUMNS: [&str; 5] = [
    "PyteomicsSequence",
    "Modified sequence",
    SEQUENCE,
    FRACTION,
    SCORE,
];

// ---------------------------------------------------------------------------
// PeptideTable – the modelling view of a loaded frame
// ---------------------------------------------------------------------------

/// Peptide observations split into identifiers, target and a dense feature
/// matrix (rows = peptides, columns = `feature_names`).
#[derive(Debug, Clone)]
pub struct PeptideTable {
    pub sequences: Vec<String>,
    pub fractions: Vec<f64>,
    pub scores: Option<Vec<f64>>,
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
}

impl PeptideTable {
    /// Assemble a table from parts, checking that row counts agree.
    pub fn new(
        sequences: Vec<String>,
        fractions: Vec<f64>,
        feature_names: Vec<String>,
        features: Array2<f64>,
    ) -> Result<Self> {
        let n = features.nrows();
        if sequences.len() != n || fractions.len() != n {
            return Err(DepartError::Shape(format!(
                "{} sequences and {} fractions for {n} feature rows",
                sequences.len(),
                fractions.len()
            )));
        }
        if feature_names.len() != features.ncols() {
            return Err(DepartError::Shape(format!(
                "{} feature names for {} feature columns",
                feature_names.len(),
                features.ncols()
            )));
        }
        Ok(Self {
            sequences,
            fractions,
            scores: None,
            feature_names,
            features,
        })
    }

    /// Strip identifier columns from a loaded frame and collect the rest as
    /// numeric features.
    ///
    /// `Sequence` and `Fraction` are required; `Score` is kept aside when
    /// present. Any remaining column must be numeric in every row.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let seq_col = frame
            .column(SEQUENCE)
            .ok_or_else(|| DepartError::MissingColumn(SEQUENCE.to_string()))?;
        let frac_col = frame
            .column(FRACTION)
            .ok_or_else(|| DepartError::MissingColumn(FRACTION.to_string()))?;

        let sequences = seq_col
            .cells
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                cell.as_text().ok_or_else(|| DepartError::InvalidCell {
                    column: SEQUENCE.to_string(),
                    row,
                    reason: "missing sequence".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let fractions = numeric_column(FRACTION, &frac_col.cells)?;
        // Score is informational only; unusable cells become NaN.
        let scores: Option<Vec<f64>> = frame
            .column(SCORE)
            .map(|c| c.cells.iter().map(|cell| cell.as_f64().unwrap_or(f64::NAN)).collect());

        let feature_cols: Vec<_> = frame
            .columns
            .iter()
            .filter(|c| !IDENTIFIER_COLUMNS.contains(&c.name.as_str()))
            .collect();

        let n = frame.len();
        let mut features = Array2::<f64>::zeros((n, feature_cols.len()));
        for (j, col) in feature_cols.iter().enumerate() {
            let values = numeric_column(&col.name, &col.cells)?;
            for (i, v) in values.into_iter().enumerate() {
                features[[i, j]] = v;
            }
        }

        let mut table = Self::new(
            sequences,
            fractions,
            feature_cols.iter().map(|c| c.name.clone()).collect(),
            features,
        )?;
        table.scores = scores;
        Ok(table)
    }

    /// Number of peptides.
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Copy of the feature rows at `indices`.
    pub fn feature_rows(&self, indices: &[usize]) -> Array2<f64> {
        self.features.select(Axis(0), indices)
    }

    /// Fractions at `indices`.
    pub fn fraction_rows(&self, indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&i| self.fractions[i]).collect()
    }

    /// Sequences at `indices`.
    pub fn sequence_rows(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| self.sequences[i].clone()).collect()
    }

    /// Number of distinct fraction labels.
    pub fn n_fractions(&self) -> usize {
        let mut values = self.fractions.clone();
        values.sort_by(f64::total_cmp);
        values.dedup();
        values.len()
    }
}

fn numeric_column(name: &str, cells: &[super::model::Cell]) -> Result<Vec<f64>> {
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.as_f64().ok_or_else(|| DepartError::InvalidCell {
                column: name.to_string(),
                row,
                reason: format!("expected a number, found '{cell}'"),
            })
        })
        .collect()
}
