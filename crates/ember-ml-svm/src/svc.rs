use ember_ml_core::validate::{check_paired, feature_count};
use ember_ml_core::{rng_from_seed, Float, MlError, MlResult};
use rand::Rng;

/// Kernel function for the support vector classifier.
#[derive(Debug, Clone, Copy)]
pub enum Kernel<T: Float> {
    Linear,
    Rbf { gamma: T },
    Polynomial { degree: u32, coef0: T },
}

impl<T: Float> Kernel<T> {
    fn eval(&self, a: &[T], b: &[T]) -> T {
        match self {
            Kernel::Linear => a.iter().zip(b.iter()).map(|(&p, &q)| p * q).sum(),
            Kernel::Rbf { gamma } => {
                let sq: T = a
                    .iter()
                    .zip(b.iter())
                    .map(|(&p, &q)| (p - q) * (p - q))
                    .sum();
                (-*gamma * sq).exp()
            }
            Kernel::Polynomial { degree, coef0 } => {
                let dot: T = a.iter().zip(b.iter()).map(|(&p, &q)| p * q).sum();
                (dot + *coef0).powi(*degree as i32)
            }
        }
    }
}

/// Binary support vector classifier trained with simplified SMO.
///
/// Labels are {0, 1}, mapped internally to ±1. Training sweeps the
/// multipliers until `max_passes` consecutive sweeps change nothing (with a
/// hard iteration cap); on linearly separable data the fitted margin
/// separates the training set.
pub struct Svc<T: Float> {
    pub c: T,
    pub kernel: Kernel<T>,
    pub max_passes: usize,
    pub max_iter: usize,
    pub tol: T,
    pub seed: Option<u64>,
    alphas: Option<Vec<T>>,
    bias: T,
    x_train: Vec<Vec<T>>,
    y_signed: Vec<T>,
}

impl<T: Float> Svc<T> {
    pub fn new(c: T, kernel: Kernel<T>) -> Self {
        Svc {
            c,
            kernel,
            max_passes: 10,
            max_iter: 1000,
            tol: T::from_f64(1e-3),
            seed: None,
            alphas: None,
            bias: T::ZERO,
            x_train: Vec::new(),
            y_signed: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[usize]) -> MlResult<()> {
        check_paired(x, y)?;
        if self.c <= T::ZERO {
            return Err(MlError::InvalidConfiguration(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            return Err(MlError::InvalidConfiguration(format!(
                "binary classifier got label {}",
                bad
            )));
        }
        if x.len() < 2 {
            return Err(MlError::InvalidConfiguration(
                "training needs at least two samples".to_string(),
            ));
        }

        let n = x.len();
        let labels: Vec<T> = y
            .iter()
            .map(|&l| if l == 1 { T::ONE } else { T::NEG_ONE })
            .collect();

        // Dense kernel matrix; training sets here are small enough to hold it.
        let mut gram = vec![T::ZERO; n * n];
        for i in 0..n {
            for j in i..n {
                let k = self.kernel.eval(&x[i], &x[j]);
                gram[i * n + j] = k;
                gram[j * n + i] = k;
            }
        }

        let mut alphas = vec![T::ZERO; n];
        let mut b = T::ZERO;
        let mut rng = rng_from_seed(self.seed);

        let f = |alphas: &[T], b: T, i: usize| -> T {
            let mut sum = b;
            for j in 0..n {
                if alphas[j] != T::ZERO {
                    sum += alphas[j] * labels[j] * gram[j * n + i];
                }
            }
            sum
        };

        let mut quiet_passes = 0;
        let mut sweeps = 0;
        while quiet_passes < self.max_passes && sweeps < self.max_iter {
            sweeps += 1;
            let mut num_changed = 0;

            for i in 0..n {
                let ei = f(&alphas, b, i) - labels[i];
                let yi = labels[i];

                let violates = (yi * ei < -self.tol && alphas[i] < self.c)
                    || (yi * ei > self.tol && alphas[i] > T::ZERO);
                if !violates {
                    continue;
                }

                // Random partner, distinct from i.
                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let yj = labels[j];
                let ej = f(&alphas, b, j) - yj;

                let ai_old = alphas[i];
                let aj_old = alphas[j];

                let (lo, hi) = if yi != yj {
                    (
                        T::ZERO.max(aj_old - ai_old),
                        self.c.min(self.c + aj_old - ai_old),
                    )
                } else {
                    (
                        T::ZERO.max(ai_old + aj_old - self.c),
                        self.c.min(ai_old + aj_old),
                    )
                };
                if (hi - lo).abs() < T::EPSILON {
                    continue;
                }

                let eta = T::TWO * gram[i * n + j] - gram[i * n + i] - gram[j * n + j];
                if eta >= T::ZERO {
                    continue;
                }

                let mut aj_new = aj_old - yj * (ei - ej) / eta;
                aj_new = aj_new.max(lo).min(hi);
                if (aj_new - aj_old).abs() < T::from_f64(1e-5) {
                    continue;
                }

                let ai_new = ai_old + yi * yj * (aj_old - aj_new);

                let b1 = b - ei
                    - yi * (ai_new - ai_old) * gram[i * n + i]
                    - yj * (aj_new - aj_old) * gram[i * n + j];
                let b2 = b - ej
                    - yi * (ai_new - ai_old) * gram[i * n + j]
                    - yj * (aj_new - aj_old) * gram[j * n + j];
                b = if ai_new > T::ZERO && ai_new < self.c {
                    b1
                } else if aj_new > T::ZERO && aj_new < self.c {
                    b2
                } else {
                    (b1 + b2) / T::TWO
                };

                alphas[i] = ai_new;
                alphas[j] = aj_new;
                num_changed += 1;
            }

            if num_changed == 0 {
                quiet_passes += 1;
            } else {
                quiet_passes = 0;
            }
        }

        self.alphas = Some(alphas);
        self.bias = b;
        self.x_train = x.to_vec();
        self.y_signed = labels;
        Ok(())
    }

    /// Signed margin for each sample; positive predicts class 1.
    pub fn decision_function(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        let alphas = self.alphas.as_ref().ok_or(MlError::NotFitted("Svc"))?;
        let d = feature_count(x)?;
        if d != self.x_train[0].len() {
            return Err(MlError::DimensionMismatch(format!(
                "fitted on {} features, got {}",
                self.x_train[0].len(),
                d
            )));
        }
        Ok(x.iter()
            .map(|row| {
                let mut sum = self.bias;
                for ((alpha, label), support) in alphas
                    .iter()
                    .zip(self.y_signed.iter())
                    .zip(self.x_train.iter())
                {
                    if alpha.abs() > T::EPSILON {
                        sum += *alpha * *label * self.kernel.eval(support, row);
                    }
                }
                sum
            })
            .collect())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<usize>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|margin| usize::from(margin >= T::ZERO))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![5.5, 5.5],
            vec![6.0, 6.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_linear_separable() {
        let (x, y) = separable();
        let mut svc = Svc::new(1.0, Kernel::Linear).with_seed(42);
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), y);

        // Non-negative margin on the training set after sign mapping.
        let margins = svc.decision_function(&x).unwrap();
        for (m, &label) in margins.iter().zip(y.iter()) {
            let sign = if label == 1 { 1.0 } else { -1.0 };
            assert!(m * sign >= 0.0, "margin {} for label {}", m, label);
        }
    }

    #[test]
    fn test_rbf_ring() {
        // An inner cluster inside an outer ring is not linearly separable.
        let x = vec![
            vec![0.0, 0.1],
            vec![0.1, -0.1],
            vec![-0.1, 0.0],
            vec![3.0, 0.0],
            vec![-3.0, 0.0],
            vec![0.0, 3.0],
            vec![0.0, -3.0],
        ];
        let y = vec![1, 1, 1, 0, 0, 0, 0];
        let mut svc = Svc::new(10.0, Kernel::Rbf { gamma: 0.5 }).with_seed(7);
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_polynomial_kernel_runs() {
        let (x, y) = separable();
        let mut svc = Svc::new(1.0, Kernel::Polynomial { degree: 2, coef0: 1.0 }).with_seed(3);
        svc.fit(&x, &y).unwrap();
        let correct = svc
            .predict(&x)
            .unwrap()
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| p == t)
            .count();
        assert!(correct >= 5, "classified {} of 6", correct);
    }

    #[test]
    fn test_invalid_configuration() {
        let (x, y) = separable();
        let mut svc = Svc::new(0.0, Kernel::Linear);
        assert!(svc.fit(&x, &y).is_err());
        let mut svc = Svc::new(1.0, Kernel::Linear);
        assert!(svc.fit(&x, &[0, 0, 0, 1, 1, 2]).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let svc: Svc<f64> = Svc::new(1.0, Kernel::Linear);
        assert_eq!(svc.predict(&[vec![0.0]]), Err(MlError::NotFitted("Svc")));
    }

    #[test]
    fn test_seeded_reproducible() {
        let (x, y) = separable();
        let mut a = Svc::new(1.0, Kernel::Linear).with_seed(11);
        a.fit(&x, &y).unwrap();
        let mut b = Svc::new(1.0, Kernel::Linear).with_seed(11);
        b.fit(&x, &y).unwrap();
        assert_eq!(
            a.decision_function(&x).unwrap(),
            b.decision_function(&x).unwrap()
        );
    }
}
