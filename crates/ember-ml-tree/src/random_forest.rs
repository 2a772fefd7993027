use crate::decision_tree::{Criterion, DecisionTreeClassifier, DecisionTreeRegressor};
use ember_ml_core::validate::check_paired;
use ember_ml_core::{rng_from_seed, Float, MlError, MlResult};
use rand::Rng;
use rayon::prelude::*;

/// Default feature-subset width: √d for classification, d/3 for regression.
fn default_max_features(d: usize, classification: bool) -> usize {
    let m = if classification {
        (d as f64).sqrt().round() as usize
    } else {
        d / 3
    };
    m.clamp(1, d)
}

fn bootstrap_indices(n: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

fn resample<T: Float, U: Copy>(
    x: &[Vec<T>],
    y: &[U],
    indices: &[usize],
) -> (Vec<Vec<T>>, Vec<U>) {
    let xs = indices.iter().map(|&i| x[i].clone()).collect();
    let ys = indices.iter().map(|&i| y[i]).collect();
    (xs, ys)
}

fn aggregate_importances(per_tree: Vec<Vec<f64>>) -> Vec<f64> {
    let d = per_tree[0].len();
    let mut total = vec![0.0; d];
    for imp in &per_tree {
        for (acc, &v) in total.iter_mut().zip(imp.iter()) {
            *acc += v;
        }
    }
    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        for v in total.iter_mut() {
            *v /= sum;
        }
    }
    total
}

/// Bagged ensemble of decision-tree classifiers.
///
/// Each tree trains on a seeded bootstrap resample and draws a fresh random
/// feature subset at every split; prediction is the majority vote. Tree
/// votes are gathered in parallel, which cannot change the result.
pub struct RandomForestClassifier<T: Float> {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub seed: Option<u64>,
    trees: Vec<DecisionTreeClassifier<T>>,
    n_classes: usize,
}

impl<T: Float> RandomForestClassifier<T> {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        RandomForestClassifier {
            n_estimators,
            max_depth,
            min_samples_split: 2,
            max_features: None,
            criterion: Criterion::Gini,
            seed: None,
            trees: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[usize]) -> MlResult<()> {
        let d = check_paired(x, y)?;
        if self.n_estimators == 0 {
            return Err(MlError::InvalidConfiguration(
                "n_estimators must be positive".to_string(),
            ));
        }
        let m = self
            .max_features
            .unwrap_or_else(|| default_max_features(d, true));

        let mut rng = rng_from_seed(self.seed);
        self.trees.clear();
        self.n_classes = y.iter().max().copied().unwrap_or(0) + 1;

        for _ in 0..self.n_estimators {
            let sample = bootstrap_indices(x.len(), &mut rng);
            let (xb, yb) = resample(x, y, &sample);
            let mut tree = DecisionTreeClassifier::new(self.max_depth, self.min_samples_split)
                .with_criterion(self.criterion)
                .with_max_features(m, Some(rng.gen::<u64>()));
            tree.fit(&xb, &yb)?;
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<usize>> {
        if self.trees.is_empty() {
            return Err(MlError::NotFitted("RandomForestClassifier"));
        }
        let per_tree: Vec<Vec<usize>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<MlResult<_>>()?;

        let mut predictions = Vec::with_capacity(x.len());
        for row in 0..x.len() {
            let mut votes = vec![0usize; self.n_classes];
            for tree_pred in &per_tree {
                votes[tree_pred[row]] += 1;
            }
            // Ties fall to the lowest class index.
            let winner = votes
                .iter()
                .enumerate()
                .max_by_key(|&(i, &c)| (c, std::cmp::Reverse(i)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            predictions.push(winner);
        }
        Ok(predictions)
    }

    /// Tree-aggregated feature importances, normalized to sum to one.
    pub fn feature_importances(&self) -> MlResult<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::NotFitted("RandomForestClassifier"));
        }
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .iter()
            .map(|t| t.feature_importances())
            .collect::<MlResult<_>>()?;
        Ok(aggregate_importances(per_tree))
    }
}

/// Bagged ensemble of decision-tree regressors; predicts the tree mean.
pub struct RandomForestRegressor<T: Float> {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
    pub seed: Option<u64>,
    trees: Vec<DecisionTreeRegressor<T>>,
}

impl<T: Float> RandomForestRegressor<T> {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        RandomForestRegressor {
            n_estimators,
            max_depth,
            min_samples_split: 2,
            max_features: None,
            seed: None,
            trees: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[T]) -> MlResult<()> {
        let d = check_paired(x, y)?;
        if self.n_estimators == 0 {
            return Err(MlError::InvalidConfiguration(
                "n_estimators must be positive".to_string(),
            ));
        }
        let m = self
            .max_features
            .unwrap_or_else(|| default_max_features(d, false));

        let mut rng = rng_from_seed(self.seed);
        self.trees.clear();

        for _ in 0..self.n_estimators {
            let sample = bootstrap_indices(x.len(), &mut rng);
            let (xb, yb) = resample(x, y, &sample);
            let mut tree = DecisionTreeRegressor::new(self.max_depth, self.min_samples_split)
                .with_max_features(m, Some(rng.gen::<u64>()));
            tree.fit(&xb, &yb)?;
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        if self.trees.is_empty() {
            return Err(MlError::NotFitted("RandomForestRegressor"));
        }
        let per_tree: Vec<Vec<T>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<MlResult<_>>()?;

        let k = T::from_usize(self.trees.len());
        Ok((0..x.len())
            .map(|row| {
                let sum: T = per_tree.iter().map(|pred| pred[row]).sum();
                sum / k
            })
            .collect())
    }

    pub fn feature_importances(&self) -> MlResult<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::NotFitted("RandomForestRegressor"));
        }
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .iter()
            .map(|t| t.feature_importances())
            .collect::<MlResult<_>>()?;
        Ok(aggregate_importances(per_tree))
    }
}
