use ember_ml_core::validate::{check_paired, feature_count};
use ember_ml_core::{Float, MlError, MlResult};

fn euclidean<T: Float>(a: &[T], b: &[T]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = (p - q).to_f64();
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

fn validate_k(k: usize, n: usize) -> MlResult<()> {
    if k == 0 {
        return Err(MlError::InvalidConfiguration(
            "k must be positive".to_string(),
        ));
    }
    if k > n {
        return Err(MlError::InvalidConfiguration(format!(
            "k = {} exceeds {} training samples",
            k, n
        )));
    }
    Ok(())
}

/// The k nearest training rows to `row`, as (distance, training index),
/// sorted by distance with training order breaking exact distance ties.
fn k_nearest<T: Float>(row: &[T], train: &[Vec<T>], k: usize) -> Vec<(f64, usize)> {
    let mut dists: Vec<(f64, usize)> = train
        .iter()
        .enumerate()
        .map(|(j, t)| (euclidean(row, t), j))
        .collect();
    dists.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    dists.truncate(k);
    dists
}

/// Lazy k-nearest-neighbors classifier.
///
/// Vote ties break deterministically: smallest total neighbor distance wins,
/// then the class whose first vote arrived earliest in training order.
pub struct KnnClassifier<T: Float> {
    pub k: usize,
    x_train: Option<Vec<Vec<T>>>,
    y_train: Vec<usize>,
}

impl<T: Float> KnnClassifier<T> {
    pub fn new(k: usize) -> Self {
        KnnClassifier {
            k,
            x_train: None,
            y_train: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[usize]) -> MlResult<()> {
        check_paired(x, y)?;
        validate_k(self.k, x.len())?;
        self.x_train = Some(x.to_vec());
        self.y_train = y.to_vec();
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<usize>> {
        let train = self
            .x_train
            .as_ref()
            .ok_or(MlError::NotFitted("KnnClassifier"))?;
        let d = feature_count(x)?;
        if d != train[0].len() {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                train[0].len(),
                d
            )));
        }

        Ok(x.iter()
            .map(|row| {
                let neighbors = k_nearest(row, train, self.k);

                struct Tally {
                    votes: usize,
                    total_distance: f64,
                    first_index: usize,
                }
                let mut tallies: Vec<(usize, Tally)> = Vec::new();
                for &(dist, j) in &neighbors {
                    let class = self.y_train[j];
                    match tallies.iter_mut().find(|(c, _)| *c == class) {
                        Some((_, tally)) => {
                            tally.votes += 1;
                            tally.total_distance += dist;
                            tally.first_index = tally.first_index.min(j);
                        }
                        None => tallies.push((
                            class,
                            Tally {
                                votes: 1,
                                total_distance: dist,
                                first_index: j,
                            },
                        )),
                    }
                }

                let mut winner = &tallies[0];
                for candidate in &tallies[1..] {
                    let better = candidate.1.votes > winner.1.votes
                        || (candidate.1.votes == winner.1.votes
                            && (candidate.1.total_distance < winner.1.total_distance
                                || (candidate.1.total_distance == winner.1.total_distance
                                    && candidate.1.first_index < winner.1.first_index)));
                    if better {
                        winner = candidate;
                    }
                }
                winner.0
            })
            .collect())
    }
}

/// Lazy k-nearest-neighbors regressor: mean of the k nearest targets.
pub struct KnnRegressor<T: Float> {
    pub k: usize,
    x_train: Option<Vec<Vec<T>>>,
    y_train: Vec<T>,
}

impl<T: Float> KnnRegressor<T> {
    pub fn new(k: usize) -> Self {
        KnnRegressor {
            k,
            x_train: None,
            y_train: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[T]) -> MlResult<()> {
        check_paired(x, y)?;
        validate_k(self.k, x.len())?;
        self.x_train = Some(x.to_vec());
        self.y_train = y.to_vec();
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        let train = self
            .x_train
            .as_ref()
            .ok_or(MlError::NotFitted("KnnRegressor"))?;
        let d = feature_count(x)?;
        if d != train[0].len() {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                train[0].len(),
                d
            )));
        }

        Ok(x.iter()
            .map(|row| {
                let neighbors = k_nearest(row, train, self.k);
                let sum: T = neighbors.iter().map(|&(_, j)| self.y_train[j]).sum();
                sum / T::from_usize(neighbors.len())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_blobs() {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![5.5, 5.5],
            vec![6.0, 6.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let mut knn = KnnClassifier::new(3);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&x).unwrap(), y);
        assert_eq!(knn.predict(&[vec![0.1, 0.4]]).unwrap(), vec![0]);
    }

    #[test]
    fn test_vote_tie_breaks_by_total_distance() {
        // k = 2: one neighbor of each class; class 1 sits closer.
        let x = vec![vec![0.0], vec![1.0], vec![10.0]];
        let y = vec![0, 1, 0];
        let mut knn = KnnClassifier::new(2);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&[vec![0.9]]).unwrap(), vec![1]);
    }

    #[test]
    fn test_exact_tie_falls_to_training_order() {
        // The query is equidistant from both neighbors; the class whose
        // sample appears first in the training set wins.
        let x = vec![vec![-1.0], vec![1.0]];
        let y = vec![1, 0];
        let mut knn = KnnClassifier::new(2);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&[vec![0.0]]).unwrap(), vec![1]);
    }

    #[test]
    fn test_regressor_mean() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0]];
        let y = vec![1.0, 3.0, 5.0, 100.0];
        let mut knn = KnnRegressor::new(3);
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&[vec![1.0]]).unwrap();
        assert!((pred[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_k() {
        let x = vec![vec![0.0_f64], vec![1.0]];
        let y = vec![0, 1];
        let mut knn = KnnClassifier::new(0);
        assert!(knn.fit(&x, &y).is_err());
        let mut knn = KnnClassifier::new(3);
        assert!(knn.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let knn: KnnClassifier<f64> = KnnClassifier::new(1);
        assert_eq!(
            knn.predict(&[vec![0.0]]),
            Err(MlError::NotFitted("KnnClassifier"))
        );
    }

    #[test]
    fn test_predict_idempotent() {
        let x = vec![vec![0.0], vec![1.0], vec![5.0]];
        let y = vec![0, 0, 1];
        let mut knn = KnnClassifier::new(1);
        knn.fit(&x, &y).unwrap();
        let q = vec![vec![0.4], vec![4.9]];
        assert_eq!(knn.predict(&q).unwrap(), knn.predict(&q).unwrap());
    }
}
