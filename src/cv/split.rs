use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::error::{DepartError, Result};

/// One train/test partition of row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub index: usize,
    /// Ascending.
    pub train: Vec<usize>,
    /// Ascending.
    pub test: Vec<usize>,
}

/// Reproducible k-fold splitter.
///
/// The first `n % n_splits` folds hold one extra test row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: true,
            seed: 42,
        }
    }
}

impl KFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle,
            seed,
        }
    }

    /// Partition `0..n`.
    pub fn split(&self, n: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(DepartError::Config(format!(
                "k-fold needs at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n {
            return Err(DepartError::Config(format!(
                "cannot split {n} rows into {} folds",
                self.n_splits
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        if self.shuffle {
            order.shuffle(&mut StdRng::seed_from_u64(self.seed));
        }

        let base = n / self.n_splits;
        let extra = n % self.n_splits;
        let mut start = 0;
        let mut folds = Vec::with_capacity(self.n_splits);
        for index in 0..self.n_splits {
            let size = base + usize::from(index < extra);
            let mut test = order[start..start + size].to_vec();
            test.sort_unstable();

            let mut in_test = vec![false; n];
            for &i in &test {
                in_test[i] = true;
            }
            let train = (0..n).filter(|&i| !in_test[i]).collect();

            folds.push(Fold { index, train, test });
            start += size;
        }
        Ok(folds)
    }
}
