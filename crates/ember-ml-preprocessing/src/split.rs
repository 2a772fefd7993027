use ember_ml_core::{rng_from_seed, Float, MlError, MlResult};
use rand::seq::SliceRandom;

/// Split paired samples into shuffled train and test partitions.
///
/// Returns `(x_train, x_test, y_train, y_test)` with exactly
/// `round(n · test_size)` test rows and no index overlap.
#[allow(clippy::type_complexity)]
pub fn train_test_split<T: Float, U: Clone>(
    x: &[Vec<T>],
    y: &[U],
    test_size: f64,
    seed: Option<u64>,
) -> MlResult<(Vec<Vec<T>>, Vec<Vec<T>>, Vec<U>, Vec<U>)> {
    ember_ml_core::validate::check_paired(x, y)?;
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(MlError::InvalidConfiguration(format!(
            "test_size must lie in (0, 1), got {}",
            test_size
        )));
    }
    let n = x.len();
    let n_test = ((n as f64) * test_size).round() as usize;
    let n_train = n - n_test;

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = rng_from_seed(seed);
    indices.shuffle(&mut rng);

    let mut x_train = Vec::with_capacity(n_train);
    let mut y_train = Vec::with_capacity(n_train);
    let mut x_test = Vec::with_capacity(n_test);
    let mut y_test = Vec::with_capacity(n_test);

    for &i in &indices[..n_train] {
        x_train.push(x[i].clone());
        y_train.push(y[i].clone());
    }
    for &i in &indices[n_train..] {
        x_test.push(x[i].clone());
        y_test.push(y[i].clone());
    }

    Ok((x_train, x_test, y_train, y_test))
}

/// K-fold cross-validation splitter.
///
/// `split(n)` yields `(train_indices, test_indices)` per fold; the test folds
/// are disjoint and their union covers every index exactly once.
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        KFold {
            n_splits,
            shuffle: false,
            seed: None,
        }
    }

    pub fn with_shuffle(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    #[allow(clippy::type_complexity)]
    pub fn split(&self, n_samples: usize) -> MlResult<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits < 2 {
            return Err(MlError::InvalidConfiguration(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n_samples {
            return Err(MlError::InvalidConfiguration(format!(
                "cannot split {} samples into {} folds",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = rng_from_seed(self.seed);
            indices.shuffle(&mut rng);
        }

        // The first n % k folds take one extra sample.
        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            let test: Vec<usize> = indices[start..start + size].to_vec();
            let train: Vec<usize> = indices[..start]
                .iter()
                .chain(indices[start + size..].iter())
                .copied()
                .collect();
            folds.push((train, test));
            start += size;
        }
        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_train_test_split_sizes() {
        let x: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64]).collect();
        let y: Vec<usize> = (0..100).collect();
        let (x_tr, x_te, y_tr, y_te) = train_test_split(&x, &y, 0.2, Some(3)).unwrap();
        assert_eq!(x_tr.len(), 80);
        assert_eq!(x_te.len(), 20);

        // y values double as indices here, so overlap is visible directly.
        let train: HashSet<usize> = y_tr.iter().copied().collect();
        let test: HashSet<usize> = y_te.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(x_tr.len(), y_tr.len());
        assert_eq!(x_te.len(), y_te.len());
    }

    #[test]
    fn test_train_test_split_seeded_reproducible() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<usize> = (0..20).collect();
        let a = train_test_split(&x, &y, 0.25, Some(9)).unwrap();
        let b = train_test_split(&x, &y, 0.25, Some(9)).unwrap();
        assert_eq!(a.3, b.3);
    }

    #[test]
    fn test_train_test_split_invalid_ratio() {
        let x = vec![vec![0.0_f64]];
        let y = vec![0usize];
        assert!(train_test_split(&x, &y, 0.0, None).is_err());
        assert!(train_test_split(&x, &y, 1.0, None).is_err());
    }

    #[test]
    fn test_kfold_partitions() {
        let folds = KFold::new(5).split(100).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen: HashSet<usize> = HashSet::new();
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 100);
            for &i in test {
                // Disjoint: no test index appears in two folds.
                assert!(seen.insert(i));
            }
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_kfold_uneven() {
        let folds = KFold::new(3).split(10).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, test)| test.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_kfold_invalid() {
        assert!(KFold::new(1).split(10).is_err());
        assert!(KFold::new(11).split(10).is_err());
    }
}
