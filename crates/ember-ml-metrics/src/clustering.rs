use ember_ml_core::validate::feature_count;
use ember_ml_core::{Float, MlError, MlResult};
use std::collections::HashMap;

fn check_labels<T: Float>(x: &[Vec<T>], labels: &[usize]) -> MlResult<usize> {
    let d = feature_count(x)?;
    if x.len() != labels.len() {
        return Err(MlError::DimensionMismatch(format!(
            "x has {} samples but labels has {}",
            x.len(),
            labels.len()
        )));
    }
    Ok(d)
}

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

/// Mean silhouette coefficient: for each sample, (b − a) / max(a, b) where
/// `a` is the mean distance to its own cluster and `b` the mean distance to
/// the nearest other cluster.
pub fn silhouette_score<T: Float>(x: &[Vec<T>], labels: &[usize]) -> MlResult<f64> {
    check_labels(x, labels)?;
    let n = x.len();
    if n <= 1 {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for i in 0..n {
        // Mean distance from sample i to every cluster.
        let mut sums: HashMap<usize, (f64, usize)> = HashMap::new();
        for j in 0..n {
            if i == j {
                continue;
            }
            let entry = sums.entry(labels[j]).or_insert((0.0, 0));
            entry.0 += euclidean(&x[i], &x[j]);
            entry.1 += 1;
        }

        let a = sums
            .get(&labels[i])
            .filter(|(_, count)| *count > 0)
            .map(|(sum, count)| sum / *count as f64)
            .unwrap_or(0.0);

        let b = sums
            .iter()
            .filter(|(&cluster, _)| cluster != labels[i])
            .map(|(_, (sum, count))| sum / *count as f64)
            .fold(f64::INFINITY, f64::min);
        let b = if b.is_finite() { b } else { 0.0 };

        if a.max(b) > 0.0 {
            total += (b - a) / a.max(b);
        }
    }
    Ok(total / n as f64)
}

fn comb2(n: usize) -> f64 {
    (n * n.saturating_sub(1)) as f64 / 2.0
}

/// Adjusted Rand index between two labelings, chance-corrected to 0 for
/// random assignments and 1 for identical partitions.
pub fn adjusted_rand_index(labels_a: &[usize], labels_b: &[usize]) -> MlResult<f64> {
    if labels_a.is_empty() {
        return Err(MlError::EmptyInput);
    }
    if labels_a.len() != labels_b.len() {
        return Err(MlError::DimensionMismatch(format!(
            "labelings have {} and {} entries",
            labels_a.len(),
            labels_b.len()
        )));
    }
    let n = labels_a.len();

    let mut contingency: HashMap<(usize, usize), usize> = HashMap::new();
    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut cols: HashMap<usize, usize> = HashMap::new();
    for (&a, &b) in labels_a.iter().zip(labels_b.iter()) {
        *contingency.entry((a, b)).or_insert(0) += 1;
        *rows.entry(a).or_insert(0) += 1;
        *cols.entry(b).or_insert(0) += 1;
    }

    let index: f64 = contingency.values().map(|&c| comb2(c)).sum();
    let sum_rows: f64 = rows.values().map(|&c| comb2(c)).sum();
    let sum_cols: f64 = cols.values().map(|&c| comb2(c)).sum();
    let expected = sum_rows * sum_cols / comb2(n);
    let max_index = (sum_rows + sum_cols) / 2.0;

    if (max_index - expected).abs() < 1e-15 {
        // Both partitions are trivial (all-one-cluster or all-singletons).
        return Ok(1.0);
    }
    Ok((index - expected) / (max_index - expected))
}

/// Davies-Bouldin index: mean over clusters of the worst ratio of
/// within-cluster scatter to between-centroid separation. Lower is better.
pub fn davies_bouldin_index<T: Float>(x: &[Vec<T>], labels: &[usize]) -> MlResult<f64> {
    let d = check_labels(x, labels)?;

    let mut clusters: Vec<usize> = labels.to_vec();
    clusters.sort_unstable();
    clusters.dedup();
    let k = clusters.len();
    if k < 2 {
        return Err(MlError::InvalidConfiguration(
            "Davies-Bouldin index needs at least two clusters".to_string(),
        ));
    }

    // Centroids and mean within-cluster distances.
    let mut centroids = vec![vec![0.0f64; d]; k];
    let mut counts = vec![0usize; k];
    let index_of = |c: usize| clusters.binary_search(&c).expect("cluster from union");
    for (row, &label) in x.iter().zip(labels.iter()) {
        let c = index_of(label);
        counts[c] += 1;
        for (acc, &v) in centroids[c].iter_mut().zip(row.iter()) {
            *acc += v.to_f64();
        }
    }
    for (centroid, &count) in centroids.iter_mut().zip(counts.iter()) {
        for v in centroid.iter_mut() {
            *v /= count as f64;
        }
    }

    let mut scatter = vec![0.0f64; k];
    for (row, &label) in x.iter().zip(labels.iter()) {
        let c = index_of(label);
        let dist: f64 = row
            .iter()
            .zip(centroids[c].iter())
            .map(|(&v, &m)| {
                let diff = v.to_f64() - m;
                diff * diff
            })
            .sum::<f64>()
            .sqrt();
        scatter[c] += dist;
    }
    for (s, &count) in scatter.iter_mut().zip(counts.iter()) {
        *s /= count as f64;
    }

    let mut total = 0.0;
    for i in 0..k {
        let mut worst = 0.0f64;
        for j in 0..k {
            if i == j {
                continue;
            }
            let separation: f64 = centroids[i]
                .iter()
                .zip(centroids[j].iter())
                .map(|(&a, &b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            if separation > 0.0 {
                worst = worst.max((scatter[i] + scatter[j]) / separation);
            }
        }
        total += worst;
    }
    Ok(total / k as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.1],
            vec![0.1, 0.3],
            vec![10.0, 10.0],
            vec![10.2, 9.9],
            vec![9.8, 10.1],
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_silhouette_well_separated() {
        let (x, labels) = two_blobs();
        let score = silhouette_score(&x, &labels).unwrap();
        assert!(score > 0.9, "score = {}", score);
    }

    #[test]
    fn test_silhouette_bad_labels() {
        let (x, _) = two_blobs();
        // Mixing the blobs should score far worse.
        let bad = vec![0, 1, 0, 1, 0, 1];
        let score = silhouette_score(&x, &bad).unwrap();
        assert!(score < 0.2, "score = {}", score);
    }

    #[test]
    fn test_ari_identical_and_permuted() {
        let a = vec![0, 0, 1, 1, 2, 2];
        assert_relative_eq!(adjusted_rand_index(&a, &a).unwrap(), 1.0);
        // Renaming clusters leaves the partition unchanged.
        let renamed = vec![2, 2, 0, 0, 1, 1];
        assert_relative_eq!(adjusted_rand_index(&a, &renamed).unwrap(), 1.0);
    }

    #[test]
    fn test_ari_disagreement() {
        let a = vec![0, 0, 0, 1, 1, 1];
        let b = vec![0, 1, 0, 1, 0, 1];
        assert!(adjusted_rand_index(&a, &b).unwrap() < 0.2);
    }

    #[test]
    fn test_davies_bouldin_prefers_separation() {
        let (x, labels) = two_blobs();
        let good = davies_bouldin_index(&x, &labels).unwrap();
        let bad = davies_bouldin_index(&x, &[0, 1, 0, 1, 0, 1]).unwrap();
        assert!(good < bad, "good = {}, bad = {}", good, bad);
    }

    #[test]
    fn test_davies_bouldin_single_cluster() {
        let (x, _) = two_blobs();
        assert!(davies_bouldin_index(&x, &[0; 6]).is_err());
    }
}
