use ember_ml_core::{MlError, MlResult, Tensor};

const EPS: f64 = 1e-12;

/// The loss choices accepted by `Network::compile`.
///
/// Each exposes the forward scalar value and the gradient of the mean loss
/// with respect to the prediction. Predictions are post-activation: BCE
/// expects probabilities from a sigmoid output, categorical cross-entropy a
/// softmax row per sample with one-hot targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    Mse,
    BinaryCrossEntropy,
    CategoricalCrossEntropy,
}

fn check_shapes(pred: &Tensor<f64>, target: &Tensor<f64>) -> MlResult<()> {
    if pred.shape() != target.shape() {
        return Err(MlError::ShapeMismatch {
            expected: pred.shape_vec(),
            got: target.shape_vec(),
        });
    }
    if pred.numel() == 0 {
        return Err(MlError::EmptyInput);
    }
    Ok(())
}

impl Loss {
    /// Scalar loss value, averaged over the batch.
    pub fn value(&self, pred: &Tensor<f64>, target: &Tensor<f64>) -> MlResult<f64> {
        check_shapes(pred, target)?;
        let n = pred.numel() as f64;
        match self {
            Loss::Mse => {
                let total: f64 = pred
                    .data()
                    .iter()
                    .zip(target.data().iter())
                    .map(|(&p, &t)| (p - t) * (p - t))
                    .sum();
                Ok(total / n)
            }
            Loss::BinaryCrossEntropy => {
                let total: f64 = pred
                    .data()
                    .iter()
                    .zip(target.data().iter())
                    .map(|(&p, &t)| {
                        let p = p.max(EPS).min(1.0 - EPS);
                        -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                    })
                    .sum();
                Ok(total / n)
            }
            Loss::CategoricalCrossEntropy => {
                let rows = self.batch_size(pred)? as f64;
                let total: f64 = pred
                    .data()
                    .iter()
                    .zip(target.data().iter())
                    .map(|(&p, &t)| -t * p.max(EPS).ln())
                    .sum();
                Ok(total / rows)
            }
        }
    }

    /// Gradient of the mean loss with respect to the prediction.
    pub fn gradient(&self, pred: &Tensor<f64>, target: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        check_shapes(pred, target)?;
        let n = pred.numel() as f64;
        match self {
            Loss::Mse => {
                let diff = pred.sub(target)?;
                Ok(diff.mul_scalar(2.0 / n))
            }
            Loss::BinaryCrossEntropy => {
                let data: Vec<f64> = pred
                    .data()
                    .iter()
                    .zip(target.data().iter())
                    .map(|(&p, &t)| {
                        let p = p.max(EPS).min(1.0 - EPS);
                        (p - t) / (p * (1.0 - p)) / n
                    })
                    .collect();
                Tensor::new(data, pred.shape_vec())
            }
            Loss::CategoricalCrossEntropy => {
                let rows = self.batch_size(pred)? as f64;
                let data: Vec<f64> = pred
                    .data()
                    .iter()
                    .zip(target.data().iter())
                    .map(|(&p, &t)| -t / p.max(EPS) / rows)
                    .collect();
                Tensor::new(data, pred.shape_vec())
            }
        }
    }

    fn batch_size(&self, pred: &Tensor<f64>) -> MlResult<usize> {
        if pred.ndim() != 2 {
            return Err(MlError::DimensionMismatch(format!(
                "categorical cross-entropy expects [batch, classes], got rank {}",
                pred.ndim()
            )));
        }
        pred.shape().dim(0)
    }

    /// Whether accuracy is a meaningful companion metric for this loss.
    pub fn is_classification(&self) -> bool {
        matches!(self, Loss::BinaryCrossEntropy | Loss::CategoricalCrossEntropy)
    }
}
