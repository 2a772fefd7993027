use ember_ml_core::validate::{check_paired, feature_count};
use ember_ml_core::{rng_from_seed, Float, MlError, MlResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Split quality measure for classification trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Entropy,
}

/// A node of a fitted CART tree; `L` is the leaf payload (class index for
/// classifiers, mean target for regressors).
#[derive(Debug, Clone)]
enum Node<T: Float, L: Copy> {
    Leaf {
        value: L,
    },
    Split {
        feature: usize,
        threshold: T,
        left: Box<Node<T, L>>,
        right: Box<Node<T, L>>,
    },
}

impl<T: Float, L: Copy> Node<T, L> {
    fn traverse(&self, row: &[T]) -> L {
        match self {
            Node::Leaf { value } => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.traverse(row)
                } else {
                    right.traverse(row)
                }
            }
        }
    }
}

struct GrowContext<'a, T: Float> {
    x: &'a [Vec<T>],
    max_depth: usize,
    min_samples_split: usize,
    max_features: Option<usize>,
    n_total: usize,
    rng: StdRng,
    importances: Vec<f64>,
}

impl<'a, T: Float> GrowContext<'a, T> {
    /// Feature indices considered at one node: all of them, or a fresh random
    /// subset when `max_features` is set (drawn per split, not per tree).
    fn candidate_features(&mut self, d: usize) -> Vec<usize> {
        let mut features: Vec<usize> = (0..d).collect();
        if let Some(m) = self.max_features {
            features.shuffle(&mut self.rng);
            features.truncate(m);
        }
        features
    }

    /// Recursive greedy induction. `impurity` scores an index set; `leaf`
    /// produces the terminal payload.
    fn grow<L, FI, FL>(
        &mut self,
        indices: &[usize],
        depth: usize,
        impurity: &FI,
        leaf: &FL,
    ) -> Node<T, L>
    where
        L: Copy,
        FI: Fn(&[usize]) -> f64,
        FL: Fn(&[usize]) -> L,
    {
        let parent_impurity = impurity(indices);
        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || parent_impurity <= 0.0
        {
            return Node::Leaf {
                value: leaf(indices),
            };
        }

        let d = self.x[0].len();
        let mut best: Option<(usize, T, Vec<usize>, Vec<usize>, f64)> = None;
        let mut best_gain = 0.0f64;

        for feature in self.candidate_features(d) {
            // Candidate thresholds: midpoints of consecutive distinct values.
            let mut values: Vec<T> = indices.iter().map(|&i| self.x[i][feature]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for pair in values.windows(2) {
                let threshold = (pair[0] + pair[1]) / T::TWO;
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[i][feature] <= threshold);

                let nl = left.len() as f64;
                let nr = right.len() as f64;
                let n = indices.len() as f64;
                let children = (nl / n) * impurity(&left) + (nr / n) * impurity(&right);
                let gain = parent_impurity - children;

                // Strict improvement keeps the first-encountered split on ties.
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, threshold, left, right, gain));
                }
            }
        }

        let Some((feature, threshold, left, right, gain)) = best else {
            return Node::Leaf {
                value: leaf(indices),
            };
        };

        self.importances[feature] += indices.len() as f64 / self.n_total as f64 * gain;

        let left_node = self.grow(&left, depth + 1, impurity, leaf);
        let right_node = self.grow(&right, depth + 1, impurity, leaf);
        Node::Split {
            feature,
            threshold,
            left: Box::new(left_node),
            right: Box::new(right_node),
        }
    }
}

fn validate_params(
    min_samples_split: usize,
    max_features: Option<usize>,
    d: usize,
) -> MlResult<()> {
    if min_samples_split < 2 {
        return Err(MlError::InvalidConfiguration(format!(
            "min_samples_split must be at least 2, got {}",
            min_samples_split
        )));
    }
    if let Some(m) = max_features {
        if m == 0 || m > d {
            return Err(MlError::InvalidConfiguration(format!(
                "max_features must lie in 1..={}, got {}",
                d, m
            )));
        }
    }
    Ok(())
}

fn normalized_importances(importances: &[f64]) -> Vec<f64> {
    let total: f64 = importances.iter().sum();
    if total <= 0.0 {
        return vec![0.0; importances.len()];
    }
    importances.iter().map(|&v| v / total).collect()
}

/// CART decision tree classifier.
pub struct DecisionTreeClassifier<T: Float> {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub criterion: Criterion,
    pub max_features: Option<usize>,
    pub seed: Option<u64>,
    root: Option<Node<T, usize>>,
    n_features: usize,
    n_classes: usize,
    importances: Vec<f64>,
}

impl<T: Float> DecisionTreeClassifier<T> {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        DecisionTreeClassifier {
            max_depth,
            min_samples_split,
            criterion: Criterion::Gini,
            max_features: None,
            seed: None,
            root: None,
            n_features: 0,
            n_classes: 0,
            importances: Vec::new(),
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_features(mut self, max_features: usize, seed: Option<u64>) -> Self {
        self.max_features = Some(max_features);
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[usize]) -> MlResult<()> {
        let d = check_paired(x, y)?;
        validate_params(self.min_samples_split, self.max_features, d)?;

        let n_classes = y.iter().max().copied().unwrap_or(0) + 1;
        let criterion = self.criterion;
        let impurity = |indices: &[usize]| -> f64 {
            let mut counts = vec![0usize; n_classes];
            for &i in indices {
                counts[y[i]] += 1;
            }
            let n = indices.len() as f64;
            match criterion {
                Criterion::Gini => {
                    1.0 - counts
                        .iter()
                        .map(|&c| {
                            let p = c as f64 / n;
                            p * p
                        })
                        .sum::<f64>()
                }
                Criterion::Entropy => -counts
                    .iter()
                    .filter(|&&c| c > 0)
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p.ln()
                    })
                    .sum::<f64>(),
            }
        };
        let leaf = |indices: &[usize]| -> usize {
            let mut counts = vec![0usize; n_classes];
            for &i in indices {
                counts[y[i]] += 1;
            }
            // Ties fall to the lowest class index.
            counts
                .iter()
                .enumerate()
                .max_by_key(|&(i, &c)| (c, std::cmp::Reverse(i)))
                .map(|(i, _)| i)
                .unwrap_or(0)
        };

        let mut ctx = GrowContext {
            x,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features,
            n_total: x.len(),
            rng: rng_from_seed(self.seed),
            importances: vec![0.0; d],
        };
        let indices: Vec<usize> = (0..x.len()).collect();
        let root = ctx.grow(&indices, 0, &impurity, &leaf);

        self.root = Some(root);
        self.n_features = d;
        self.n_classes = n_classes;
        self.importances = ctx.importances;
        Ok(())
    }

    pub fn predict_row(&self, row: &[T]) -> MlResult<usize> {
        let root = self
            .root
            .as_ref()
            .ok_or(MlError::NotFitted("DecisionTreeClassifier"))?;
        if row.len() != self.n_features {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(root.traverse(row))
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<usize>> {
        feature_count(x)?;
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Per-feature impurity-decrease importances, normalized to sum to one.
    pub fn feature_importances(&self) -> MlResult<Vec<f64>> {
        if self.root.is_none() {
            return Err(MlError::NotFitted("DecisionTreeClassifier"));
        }
        Ok(normalized_importances(&self.importances))
    }
}

/// CART decision tree regressor with variance-reduction splits.
pub struct DecisionTreeRegressor<T: Float> {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
    pub seed: Option<u64>,
    root: Option<Node<T, T>>,
    n_features: usize,
    importances: Vec<f64>,
}

impl<T: Float> DecisionTreeRegressor<T> {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        DecisionTreeRegressor {
            max_depth,
            min_samples_split,
            max_features: None,
            seed: None,
            root: None,
            n_features: 0,
            importances: Vec::new(),
        }
    }

    pub fn with_max_features(mut self, max_features: usize, seed: Option<u64>) -> Self {
        self.max_features = Some(max_features);
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[T]) -> MlResult<()> {
        let d = check_paired(x, y)?;
        validate_params(self.min_samples_split, self.max_features, d)?;

        let impurity = |indices: &[usize]| -> f64 {
            let n = indices.len() as f64;
            let mean = indices.iter().map(|&i| y[i].to_f64()).sum::<f64>() / n;
            indices
                .iter()
                .map(|&i| {
                    let diff = y[i].to_f64() - mean;
                    diff * diff
                })
                .sum::<f64>()
                / n
        };
        let leaf = |indices: &[usize]| -> T {
            let sum: T = indices.iter().map(|&i| y[i]).sum();
            sum / T::from_usize(indices.len())
        };

        let mut ctx = GrowContext {
            x,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features,
            n_total: x.len(),
            rng: rng_from_seed(self.seed),
            importances: vec![0.0; d],
        };
        let indices: Vec<usize> = (0..x.len()).collect();
        let root = ctx.grow(&indices, 0, &impurity, &leaf);

        self.root = Some(root);
        self.n_features = d;
        self.importances = ctx.importances;
        Ok(())
    }

    pub fn predict_row(&self, row: &[T]) -> MlResult<T> {
        let root = self
            .root
            .as_ref()
            .ok_or(MlError::NotFitted("DecisionTreeRegressor"))?;
        if row.len() != self.n_features {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(root.traverse(row))
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        feature_count(x)?;
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn feature_importances(&self) -> MlResult<Vec<f64>> {
        if self.root.is_none() {
            return Err(MlError::NotFitted("DecisionTreeRegressor"));
        }
        Ok(normalized_importances(&self.importances))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_free_blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![5.0, 6.0],
            vec![6.0, 5.0],
            vec![6.0, 6.0],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_classifier_fits_training_data() {
        let (x, y) = xor_free_blobs();
        let mut tree = DecisionTreeClassifier::new(10, 2);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_entropy_criterion() {
        let (x, y) = xor_free_blobs();
        let mut tree = DecisionTreeClassifier::new(10, 2).with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth_zero_gives_majority_leaf() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = vec![1, 1, 0];
        let mut tree = DecisionTreeClassifier::new(0, 2);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn test_importances_rank_informative_feature() {
        // Only the second feature carries signal.
        let x = vec![
            vec![1.0, 0.0],
            vec![1.0, 0.1],
            vec![1.0, 0.2],
            vec![1.0, 5.0],
            vec![1.0, 5.1],
            vec![1.0, 5.2],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let mut tree = DecisionTreeClassifier::new(5, 2);
        tree.fit(&x, &y).unwrap();
        let imp = tree.feature_importances().unwrap();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(imp[1] > imp[0]);
    }

    #[test]
    fn test_regressor_piecewise_constant() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![10.0], vec![11.0]];
        let y = vec![5.0, 5.0, 5.0, 20.0, 20.0];
        let mut tree = DecisionTreeRegressor::new(5, 2);
        tree.fit(&x, &y).unwrap();
        let pred = tree.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let tree: DecisionTreeClassifier<f64> = DecisionTreeClassifier::new(3, 2);
        assert_eq!(
            tree.predict(&[vec![0.0]]),
            Err(MlError::NotFitted("DecisionTreeClassifier"))
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let (x, y) = xor_free_blobs();
        let mut tree = DecisionTreeClassifier::new(3, 1);
        assert!(tree.fit(&x, &y).is_err());
        let mut tree = DecisionTreeClassifier::new(3, 2).with_max_features(5, None);
        assert!(tree.fit(&x, &y).is_err());
    }

    #[test]
    fn test_feature_width_checked_at_predict() {
        let (x, y) = xor_free_blobs();
        let mut tree = DecisionTreeClassifier::new(3, 2);
        tree.fit(&x, &y).unwrap();
        assert!(matches!(
            tree.predict(&[vec![1.0]]),
            Err(MlError::DimensionMismatch(_))
        ));
    }
}
