use ember_ml_core::validate::feature_count;
use ember_ml_core::{rng_from_seed, Float, MlError, MlResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Centroid initialization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init {
    /// Uniform sample of distinct data points.
    Random,
    /// First centroid uniform; each subsequent one sampled with probability
    /// proportional to squared distance from the nearest chosen centroid.
    KMeansPlusPlus,
}

/// K-means clustering by Lloyd's algorithm.
///
/// `n_init` independent restarts are run and the one with the lowest total
/// within-cluster squared distance is kept.
pub struct KMeans<T: Float> {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub n_init: usize,
    pub init: Init,
    pub seed: Option<u64>,
    centroids: Option<Vec<Vec<T>>>,
    labels: Option<Vec<usize>>,
    inertia: Option<f64>,
}

fn sq_distance<T: Float>(a: &[T], b: &[T]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = (p - q).to_f64();
            d * d
        })
        .sum()
}

fn nearest_centroid<T: Float>(row: &[T], centroids: &[Vec<T>]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, centroid) in centroids.iter().enumerate() {
        let dist = sq_distance(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = k;
        }
    }
    (best, best_dist)
}

impl<T: Float> KMeans<T> {
    pub fn new(n_clusters: usize) -> Self {
        KMeans {
            n_clusters,
            max_iter: 300,
            n_init: 10,
            init: Init::KMeansPlusPlus,
            seed: None,
            centroids: None,
            labels: None,
            inertia: None,
        }
    }

    pub fn with_init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn init_centroids(&self, x: &[Vec<T>], rng: &mut StdRng) -> Vec<Vec<T>> {
        match self.init {
            Init::Random => {
                let mut indices: Vec<usize> = (0..x.len()).collect();
                indices.shuffle(rng);
                indices[..self.n_clusters]
                    .iter()
                    .map(|&i| x[i].clone())
                    .collect()
            }
            Init::KMeansPlusPlus => {
                let mut centroids: Vec<Vec<T>> = Vec::with_capacity(self.n_clusters);
                let first = rng.gen_range(0..x.len());
                centroids.push(x[first].clone());

                while centroids.len() < self.n_clusters {
                    let distances: Vec<f64> = x
                        .iter()
                        .map(|row| nearest_centroid(row, &centroids).1)
                        .collect();
                    let total: f64 = distances.iter().sum();
                    let selected = if total <= 0.0 {
                        // All remaining points coincide with a centroid.
                        rng.gen_range(0..x.len())
                    } else {
                        let threshold = rng.gen::<f64>() * total;
                        let mut cumulative = 0.0;
                        let mut pick = x.len() - 1;
                        for (i, &d) in distances.iter().enumerate() {
                            cumulative += d;
                            if cumulative >= threshold {
                                pick = i;
                                break;
                            }
                        }
                        pick
                    };
                    centroids.push(x[selected].clone());
                }
                centroids
            }
        }
    }

    /// One full Lloyd run; returns (centroids, labels, inertia).
    fn lloyd(&self, x: &[Vec<T>], d: usize, rng: &mut StdRng) -> (Vec<Vec<T>>, Vec<usize>, f64) {
        let n = x.len();
        let mut centroids = self.init_centroids(x, rng);
        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iter {
            // Assignment step.
            let mut changed = false;
            for (i, row) in x.iter().enumerate() {
                let (k, _) = nearest_centroid(row, &centroids);
                if labels[i] != k {
                    labels[i] = k;
                    changed = true;
                }
            }

            // Update step: cluster means; empty clusters keep their centroid.
            let mut sums = vec![vec![T::ZERO; d]; self.n_clusters];
            let mut counts = vec![0usize; self.n_clusters];
            for (row, &k) in x.iter().zip(labels.iter()) {
                counts[k] += 1;
                for (acc, &v) in sums[k].iter_mut().zip(row.iter()) {
                    *acc += v;
                }
            }
            for k in 0..self.n_clusters {
                if counts[k] > 0 {
                    for (c, s) in centroids[k].iter_mut().zip(sums[k].iter()) {
                        *c = *s / T::from_usize(counts[k]);
                    }
                }
            }

            if !changed {
                break;
            }
        }

        let inertia: f64 = x
            .iter()
            .zip(labels.iter())
            .map(|(row, &k)| sq_distance(row, &centroids[k]))
            .sum();
        (centroids, labels, inertia)
    }

    pub fn fit(&mut self, x: &[Vec<T>]) -> MlResult<()> {
        let d = feature_count(x)?;
        if self.n_clusters == 0 || self.n_clusters > x.len() {
            return Err(MlError::InvalidConfiguration(format!(
                "n_clusters must lie in 1..={}, got {}",
                x.len(),
                self.n_clusters
            )));
        }
        if self.n_init == 0 {
            return Err(MlError::InvalidConfiguration(
                "n_init must be positive".to_string(),
            ));
        }

        let mut rng = rng_from_seed(self.seed);
        let mut best = self.lloyd(x, d, &mut rng);
        for _ in 1..self.n_init {
            let run = self.lloyd(x, d, &mut rng);
            if run.2 < best.2 {
                best = run;
            }
        }

        let (centroids, labels, inertia) = best;
        self.centroids = Some(centroids);
        self.labels = Some(labels);
        self.inertia = Some(inertia);
        Ok(())
    }

    /// Assign new points to the nearest fitted centroid.
    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<usize>> {
        let centroids = self.centroids.as_ref().ok_or(MlError::NotFitted("KMeans"))?;
        let d = feature_count(x)?;
        if d != centroids[0].len() {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                centroids[0].len(),
                d
            )));
        }
        Ok(x.iter()
            .map(|row| nearest_centroid(row, centroids).0)
            .collect())
    }

    pub fn centroids(&self) -> MlResult<&[Vec<T>]> {
        self.centroids
            .as_deref()
            .ok_or(MlError::NotFitted("KMeans"))
    }

    /// Labels assigned to the fitting data.
    pub fn labels(&self) -> MlResult<&[usize]> {
        self.labels.as_deref().ok_or(MlError::NotFitted("KMeans"))
    }

    /// Total within-cluster squared distance of the kept run.
    pub fn inertia(&self) -> MlResult<f64> {
        self.inertia.ok_or(MlError::NotFitted("KMeans"))
    }
}
