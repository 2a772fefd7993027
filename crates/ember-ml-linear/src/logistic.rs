use ember_ml_core::validate::check_paired;
use ember_ml_core::{Float, MlError, MlResult};
use ember_ml_metrics::accuracy_score;

/// Binary logistic regression trained by batch gradient descent on the
/// logistic loss.
pub struct LogisticRegression<T: Float> {
    pub learning_rate: T,
    pub epochs: usize,
    weights: Option<Vec<T>>,
    bias: T,
}

fn sigmoid<T: Float>(z: T) -> T {
    T::ONE / (T::ONE + (-z).exp())
}

impl<T: Float> LogisticRegression<T> {
    pub fn new(learning_rate: T, epochs: usize) -> Self {
        LogisticRegression {
            learning_rate,
            epochs,
            weights: None,
            bias: T::ZERO,
        }
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[usize]) -> MlResult<()> {
        let d = check_paired(x, y)?;
        if self.learning_rate <= T::ZERO {
            return Err(MlError::InvalidConfiguration(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(MlError::InvalidConfiguration(
                "epochs must be positive".to_string(),
            ));
        }
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            return Err(MlError::InvalidConfiguration(format!(
                "binary classifier got label {}",
                bad
            )));
        }

        let n_t = T::from_usize(x.len());
        let mut w = vec![T::ZERO; d];
        let mut b = T::ZERO;

        for _ in 0..self.epochs {
            let mut dw = vec![T::ZERO; d];
            let mut db = T::ZERO;
            for (row, &label) in x.iter().zip(y.iter()) {
                let z = row
                    .iter()
                    .zip(w.iter())
                    .fold(b, |acc, (&v, &wj)| acc + v * wj);
                let error = sigmoid(z) - T::from_usize(label);
                for (g, &v) in dw.iter_mut().zip(row.iter()) {
                    *g += error * v;
                }
                db += error;
            }
            for (wj, g) in w.iter_mut().zip(dw.iter()) {
                *wj -= self.learning_rate * *g / n_t;
            }
            b -= self.learning_rate * db / n_t;
        }

        self.weights = Some(w);
        self.bias = b;
        Ok(())
    }

    /// Probability of the positive class for each sample.
    pub fn predict_proba(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        let w = self
            .weights
            .as_ref()
            .ok_or(MlError::NotFitted("LogisticRegression"))?;
        let d = ember_ml_core::validate::feature_count(x)?;
        if d != w.len() {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                w.len(),
                d
            )));
        }
        Ok(x.iter()
            .map(|row| {
                let z = row
                    .iter()
                    .zip(w.iter())
                    .fold(self.bias, |acc, (&v, &wj)| acc + v * wj);
                sigmoid(z)
            })
            .collect())
    }

    /// Class labels at the 0.5 threshold.
    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<usize>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| usize::from(p >= T::HALF))
            .collect())
    }

    /// Accuracy on the given data.
    pub fn score(&self, x: &[Vec<T>], y: &[usize]) -> MlResult<f64> {
        let pred = self.predict(x)?;
        accuracy_score(y, &pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separable_data() {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![5.5, 5.5],
            vec![6.0, 6.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];

        let mut model = LogisticRegression::new(0.1, 1000);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.score(&x, &y).unwrap(), 1.0);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[0] < 0.5 && proba[5] > 0.5);
    }

    #[test]
    fn test_rejects_multiclass_labels() {
        let mut model = LogisticRegression::new(0.1, 10);
        assert!(matches!(
            model.fit(&[vec![0.0_f64], vec![1.0]], &[0, 2]),
            Err(MlError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_configuration() {
        let mut model = LogisticRegression::new(0.0, 10);
        assert!(model.fit(&[vec![0.0_f64]], &[0]).is_err());
        let mut model = LogisticRegression::new(0.1, 0);
        assert!(model.fit(&[vec![0.0_f64]], &[0]).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model: LogisticRegression<f64> = LogisticRegression::new(0.1, 10);
        assert_eq!(
            model.predict(&[vec![0.0]]),
            Err(MlError::NotFitted("LogisticRegression"))
        );
    }

    #[test]
    fn test_predict_idempotent() {
        let x = vec![vec![0.0], vec![1.0], vec![4.0], vec![5.0]];
        let y = vec![0, 0, 1, 1];
        let mut model = LogisticRegression::new(0.5, 500);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
