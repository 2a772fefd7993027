use ember_ml_core::validate::feature_count;
use ember_ml_core::{Float, MlError, MlResult};

fn safe_divisor<T: Float>(v: T) -> T {
    if v.abs() < T::EPSILON {
        T::ONE
    } else {
        v
    }
}

/// Standardize features by removing the mean and scaling to unit variance.
///
/// Statistics are per feature over a sample-by-feature array; population
/// standard deviation, matching the fitting data exactly.
pub struct StandardScaler<T: Float> {
    stats: Option<(Vec<T>, Vec<T>)>,
}

impl<T: Float> StandardScaler<T> {
    pub fn new() -> Self {
        StandardScaler { stats: None }
    }

    pub fn fit(&mut self, x: &[Vec<T>]) -> MlResult<()> {
        let d = feature_count(x)?;
        let n = T::from_usize(x.len());
        let mut mean = vec![T::ZERO; d];
        for row in x {
            for (m, &v) in mean.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m = *m / n;
        }
        let mut std = vec![T::ZERO; d];
        for row in x {
            for j in 0..d {
                let diff = row[j] - mean[j];
                std[j] += diff * diff;
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt();
        }
        self.stats = Some((mean, std));
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let (mean, std) = self
            .stats
            .as_ref()
            .ok_or(MlError::NotFitted("StandardScaler"))?;
        check_width(x, mean.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(mean.iter().zip(std.iter()))
                    .map(|(&v, (&m, &s))| (v - m) / safe_divisor(s))
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Map standardized values back to the original scale.
    pub fn inverse_transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let (mean, std) = self
            .stats
            .as_ref()
            .ok_or(MlError::NotFitted("StandardScaler"))?;
        check_width(x, mean.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(mean.iter().zip(std.iter()))
                    .map(|(&v, (&m, &s))| v * safe_divisor(s) + m)
                    .collect()
            })
            .collect())
    }
}

impl<T: Float> Default for StandardScaler<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale features to the [0, 1] range.
pub struct MinMaxScaler<T: Float> {
    stats: Option<(Vec<T>, Vec<T>)>,
}

impl<T: Float> MinMaxScaler<T> {
    pub fn new() -> Self {
        MinMaxScaler { stats: None }
    }

    pub fn fit(&mut self, x: &[Vec<T>]) -> MlResult<()> {
        let d = feature_count(x)?;
        let mut min = vec![T::INFINITY; d];
        let mut max = vec![T::NEG_INFINITY; d];
        for row in x {
            for j in 0..d {
                min[j] = min[j].min(row[j]);
                max[j] = max[j].max(row[j]);
            }
        }
        self.stats = Some((min, max));
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let (min, max) = self
            .stats
            .as_ref()
            .ok_or(MlError::NotFitted("MinMaxScaler"))?;
        check_width(x, min.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(min.iter().zip(max.iter()))
                    .map(|(&v, (&lo, &hi))| (v - lo) / safe_divisor(hi - lo))
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn inverse_transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let (min, max) = self
            .stats
            .as_ref()
            .ok_or(MlError::NotFitted("MinMaxScaler"))?;
        check_width(x, min.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(min.iter().zip(max.iter()))
                    .map(|(&v, (&lo, &hi))| v * safe_divisor(hi - lo) + lo)
                    .collect()
            })
            .collect())
    }
}

impl<T: Float> Default for MinMaxScaler<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-sample norm used by [`Normalizer`].
#[derive(Debug, Clone, Copy)]
pub enum Norm {
    L1,
    L2,
}

/// Scale each sample to unit norm. Stateless: there is nothing to fit.
pub struct Normalizer {
    pub norm: Norm,
}

impl Normalizer {
    pub fn new(norm: Norm) -> Self {
        Normalizer { norm }
    }

    pub fn transform<T: Float>(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        feature_count(x)?;
        Ok(x.iter()
            .map(|row| {
                let n = match self.norm {
                    Norm::L1 => row.iter().map(|v| v.abs()).sum::<T>(),
                    Norm::L2 => row.iter().map(|&v| v * v).sum::<T>().sqrt(),
                };
                let n = safe_divisor(n);
                row.iter().map(|&v| v / n).collect()
            })
            .collect())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Norm::L2)
    }
}

/// Scale features by median and interquartile range, robust to outliers.
pub struct RobustScaler<T: Float> {
    stats: Option<(Vec<T>, Vec<T>)>,
}

impl<T: Float> RobustScaler<T> {
    pub fn new() -> Self {
        RobustScaler { stats: None }
    }

    pub fn fit(&mut self, x: &[Vec<T>]) -> MlResult<()> {
        let d = feature_count(x)?;
        let mut median = Vec::with_capacity(d);
        let mut iqr = Vec::with_capacity(d);
        for j in 0..d {
            let mut col: Vec<T> = x.iter().map(|row| row[j]).collect();
            col.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            median.push(percentile(&col, 0.5));
            iqr.push(percentile(&col, 0.75) - percentile(&col, 0.25));
        }
        self.stats = Some((median, iqr));
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let (median, iqr) = self
            .stats
            .as_ref()
            .ok_or(MlError::NotFitted("RobustScaler"))?;
        check_width(x, median.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(median.iter().zip(iqr.iter()))
                    .map(|(&v, (&m, &q))| (v - m) / safe_divisor(q))
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        self.fit(x)?;
        self.transform(x)
    }
}

impl<T: Float> Default for RobustScaler<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear-interpolated percentile of an already-sorted column.
fn percentile<T: Float>(sorted: &[T], q: f64) -> T {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = T::from_f64(pos - lo as f64);
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Yeo-Johnson power transform toward a more Gaussian-shaped distribution.
///
/// The per-feature exponent is chosen from a fixed coarse grid by
/// log-likelihood; exact maximum-likelihood search is not attempted.
pub struct PowerTransformer<T: Float> {
    lambdas: Option<Vec<T>>,
}

const LAMBDA_GRID: [f64; 17] = [
    -2.0, -1.75, -1.5, -1.25, -1.0, -0.75, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5,
    1.75, 2.0,
];

fn yeo_johnson<T: Float>(v: T, lambda: T) -> T {
    if v >= T::ZERO {
        if lambda.abs() < T::from_f64(1e-12) {
            (v + T::ONE).ln()
        } else {
            ((v + T::ONE).powf(lambda) - T::ONE) / lambda
        }
    } else if (lambda - T::TWO).abs() < T::from_f64(1e-12) {
        -(T::ONE - v).ln()
    } else {
        -((T::ONE - v).powf(T::TWO - lambda) - T::ONE) / (T::TWO - lambda)
    }
}

impl<T: Float> PowerTransformer<T> {
    pub fn new() -> Self {
        PowerTransformer { lambdas: None }
    }

    /// Profile log-likelihood of the Yeo-Johnson transform for one column.
    fn log_likelihood(col: &[T], lambda: T) -> f64 {
        let n = col.len() as f64;
        let transformed: Vec<f64> = col.iter().map(|&v| yeo_johnson(v, lambda).to_f64()).collect();
        let mean = transformed.iter().sum::<f64>() / n;
        let var = transformed.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>() / n;
        let jacobian: f64 = col
            .iter()
            .map(|&v| {
                let v = v.to_f64();
                v.signum() * (v.abs() + 1.0).ln()
            })
            .sum();
        -n / 2.0 * var.max(1e-12).ln() + (lambda.to_f64() - 1.0) * jacobian
    }

    pub fn fit(&mut self, x: &[Vec<T>]) -> MlResult<()> {
        let d = feature_count(x)?;
        let mut lambdas = Vec::with_capacity(d);
        for j in 0..d {
            let col: Vec<T> = x.iter().map(|row| row[j]).collect();
            let mut best = T::ONE;
            let mut best_ll = f64::NEG_INFINITY;
            for &l in &LAMBDA_GRID {
                let lambda = T::from_f64(l);
                let ll = Self::log_likelihood(&col, lambda);
                if ll > best_ll {
                    best_ll = ll;
                    best = lambda;
                }
            }
            lambdas.push(best);
        }
        self.lambdas = Some(lambdas);
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let lambdas = self
            .lambdas
            .as_ref()
            .ok_or(MlError::NotFitted("PowerTransformer"))?;
        check_width(x, lambdas.len())?;
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(lambdas.iter())
                    .map(|(&v, &l)| yeo_johnson(v, l))
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Fitted per-feature exponents.
    pub fn lambdas(&self) -> MlResult<&[T]> {
        self.lambdas
            .as_deref()
            .ok_or(MlError::NotFitted("PowerTransformer"))
    }
}

impl<T: Float> Default for PowerTransformer<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_width<T: Float>(x: &[Vec<T>], expected: usize) -> MlResult<()> {
    let d = feature_count(x)?;
    if d != expected {
        return Err(MlError::DimensionMismatch(format!(
            "fitted on {} features, got {}",
            expected, d
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_scaler() {
        let x = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let mut scaler = StandardScaler::new();
        let t = scaler.fit_transform(&x).unwrap();

        for j in 0..2 {
            let mean: f64 = t.iter().map(|r| r[j]).sum::<f64>() / 3.0;
            let var: f64 = t.iter().map(|r| (r[j] - mean) * (r[j] - mean)).sum::<f64>() / 3.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-10);
            assert_relative_eq!(var.sqrt(), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_standard_scaler_inverse_roundtrip() {
        let x = vec![vec![1.0, -7.5], vec![3.0, 2.5], vec![5.0, 11.0]];
        let mut scaler = StandardScaler::new();
        let t = scaler.fit_transform(&x).unwrap();
        let back = scaler.inverse_transform(&t).unwrap();
        for (row, orig) in back.iter().zip(x.iter()) {
            for (a, b) in row.iter().zip(orig.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler: StandardScaler<f64> = StandardScaler::new();
        assert_eq!(
            scaler.transform(&[vec![1.0]]),
            Err(MlError::NotFitted("StandardScaler"))
        );
    }

    #[test]
    fn test_minmax_scaler() {
        let x = vec![vec![1.0, 10.0], vec![5.0, 20.0], vec![3.0, 30.0]];
        let mut scaler = MinMaxScaler::new();
        let t = scaler.fit_transform(&x).unwrap();

        for j in 0..2 {
            let min = t.iter().map(|r| r[j]).fold(f64::INFINITY, f64::min);
            let max = t.iter().map(|r| r[j]).fold(f64::NEG_INFINITY, f64::max);
            assert_relative_eq!(min, 0.0);
            assert_relative_eq!(max, 1.0);
        }

        let back = scaler.inverse_transform(&t).unwrap();
        assert_relative_eq!(back[2][1], 30.0, epsilon = 1e-10);
    }

    #[test]
    fn test_normalizer() {
        let x = vec![vec![3.0, 4.0], vec![0.0, 0.0]];
        let t = Normalizer::default().transform(&x).unwrap();
        assert_relative_eq!(t[0][0], 0.6);
        assert_relative_eq!(t[0][1], 0.8);
        // Zero rows pass through untouched.
        assert_eq!(t[1], vec![0.0, 0.0]);
    }

    #[test]
    fn test_robust_scaler() {
        // Median 3, IQR 2 in the first feature; the outlier barely moves them.
        let x = vec![
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![4.0],
            vec![100.0],
        ];
        let mut scaler = RobustScaler::new();
        let t = scaler.fit_transform(&x).unwrap();
        assert_relative_eq!(t[2][0], 0.0);
        assert_relative_eq!(t[3][0], 0.5);
    }

    #[test]
    fn test_power_transformer_reduces_skew() {
        let x: Vec<Vec<f64>> = (1..=20).map(|i| vec![(i as f64).exp()]).collect();
        let mut pt = PowerTransformer::new();
        let t = pt.fit_transform(&x).unwrap();
        // A log-like lambda should be selected for exponential data.
        assert!(pt.lambdas().unwrap()[0] < 0.5);
        assert!(t.iter().all(|r| r[0].is_finite()));
    }
}
