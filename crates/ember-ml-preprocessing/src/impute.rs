use ember_ml_core::validate::feature_count;
use ember_ml_core::{Float, MlError, MlResult};

/// Replacement statistic used by [`SimpleImputer`].
#[derive(Debug, Clone, Copy)]
pub enum ImputeStrategy {
    Mean,
    Median,
}

/// Fill NaN entries with a per-feature statistic computed over the
/// non-missing values of the fitting data.
pub struct SimpleImputer<T: Float> {
    pub strategy: ImputeStrategy,
    fill: Option<Vec<T>>,
}

impl<T: Float> SimpleImputer<T> {
    pub fn new(strategy: ImputeStrategy) -> Self {
        SimpleImputer {
            strategy,
            fill: None,
        }
    }

    pub fn fit(&mut self, x: &[Vec<T>]) -> MlResult<()> {
        let d = feature_count(x)?;
        let mut fill = Vec::with_capacity(d);
        for j in 0..d {
            let mut present: Vec<T> = x
                .iter()
                .map(|row| row[j])
                .filter(|v| !v.is_nan())
                .collect();
            if present.is_empty() {
                return Err(MlError::InvalidConfiguration(format!(
                    "feature {} has no observed values to impute from",
                    j
                )));
            }
            let stat = match self.strategy {
                ImputeStrategy::Mean => {
                    present.iter().copied().sum::<T>() / T::from_usize(present.len())
                }
                ImputeStrategy::Median => {
                    present
                        .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    let mid = present.len() / 2;
                    if present.len() % 2 == 0 {
                        (present[mid - 1] + present[mid]) / T::TWO
                    } else {
                        present[mid]
                    }
                }
            };
            fill.push(stat);
        }
        self.fill = Some(fill);
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        let fill = self.fill.as_ref().ok_or(MlError::NotFitted("SimpleImputer"))?;
        let d = feature_count(x)?;
        if d != fill.len() {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                fill.len(),
                d
            )));
        }
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(fill.iter())
                    .map(|(&v, &f)| if v.is_nan() { f } else { v })
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<T>]) -> MlResult<Vec<Vec<T>>> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_impute() {
        let x = vec![vec![1.0, f64::NAN], vec![3.0, 4.0], vec![f64::NAN, 8.0]];
        let mut imp = SimpleImputer::new(ImputeStrategy::Mean);
        let t = imp.fit_transform(&x).unwrap();
        assert_eq!(t[2][0], 2.0);
        assert_eq!(t[0][1], 6.0);
        assert_eq!(t[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_median_impute() {
        let x = vec![
            vec![1.0],
            vec![2.0],
            vec![9.0],
            vec![f64::NAN],
        ];
        let mut imp = SimpleImputer::new(ImputeStrategy::Median);
        let t = imp.fit_transform(&x).unwrap();
        assert_eq!(t[3][0], 2.0);
    }

    #[test]
    fn test_all_missing_feature_rejected() {
        let x = vec![vec![f64::NAN], vec![f64::NAN]];
        let mut imp = SimpleImputer::new(ImputeStrategy::Mean);
        assert!(matches!(
            imp.fit(&x),
            Err(MlError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let imp: SimpleImputer<f64> = SimpleImputer::new(ImputeStrategy::Mean);
        assert_eq!(
            imp.transform(&[vec![1.0]]),
            Err(MlError::NotFitted("SimpleImputer"))
        );
    }
}
