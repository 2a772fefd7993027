use crate::solve::solve_system;
use ember_ml_core::validate::check_paired;
use ember_ml_core::{Float, MlError, MlResult};
use ember_ml_metrics::r2_score;

/// Fitting strategy for the linear models.
#[derive(Debug, Clone, Copy)]
pub enum Solver<T: Float> {
    /// Closed-form normal equations.
    Normal,
    /// Batch gradient descent on the squared error.
    GradientDescent { learning_rate: T, epochs: usize },
}

impl<T: Float> Solver<T> {
    fn validate(&self) -> MlResult<()> {
        if let Solver::GradientDescent {
            learning_rate,
            epochs,
        } = self
        {
            if *learning_rate <= T::ZERO {
                return Err(MlError::InvalidConfiguration(format!(
                    "learning rate must be positive, got {}",
                    learning_rate
                )));
            }
            if *epochs == 0 {
                return Err(MlError::InvalidConfiguration(
                    "epochs must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Fitted affine coefficients shared by the linear models.
struct Coefficients<T: Float> {
    weights: Vec<T>,
    bias: T,
}

fn predict_with<T: Float>(coef: &Coefficients<T>, x: &[Vec<T>]) -> MlResult<Vec<T>> {
    let d = ember_ml_core::validate::feature_count(x)?;
    if d != coef.weights.len() {
        return Err(MlError::DimensionMismatch(format!(
            "fitted on {} features, got {}",
            coef.weights.len(),
            d
        )));
    }
    Ok(x.iter()
        .map(|row| {
            row.iter()
                .zip(coef.weights.iter())
                .fold(coef.bias, |acc, (&v, &w)| acc + v * w)
        })
        .collect())
}

/// Normal-equation solve of `min ‖Xw − y‖² + alpha·‖w‖²`.
///
/// The intercept column is prepended and excluded from regularization.
fn fit_normal<T: Float>(x: &[Vec<T>], y: &[T], alpha: T) -> MlResult<Coefficients<T>> {
    let n = x.len();
    let d = x[0].len();
    let dim = d + 1;

    // Gram matrix of the intercept-augmented design, XᵀX.
    let mut gram = vec![T::ZERO; dim * dim];
    let mut rhs = vec![T::ZERO; dim];
    let augmented = |row: &Vec<T>, j: usize| if j == 0 { T::ONE } else { row[j - 1] };
    for i in 0..n {
        for j in 0..dim {
            let xj = augmented(&x[i], j);
            rhs[j] += xj * y[i];
            for k in j..dim {
                gram[j * dim + k] += xj * augmented(&x[i], k);
            }
        }
    }
    for j in 0..dim {
        for k in 0..j {
            gram[j * dim + k] = gram[k * dim + j];
        }
    }
    // Ridge term on every coefficient except the intercept.
    for j in 1..dim {
        gram[j * dim + j] += alpha;
    }

    let w = solve_system(gram, rhs, dim)?;
    Ok(Coefficients {
        bias: w[0],
        weights: w[1..].to_vec(),
    })
}

/// Batch gradient descent on `mean((Xw + b − y)²) + alpha·mean(w²)`.
fn fit_gradient_descent<T: Float>(
    x: &[Vec<T>],
    y: &[T],
    alpha: T,
    learning_rate: T,
    epochs: usize,
) -> MlResult<Coefficients<T>> {
    let n = x.len();
    let d = x[0].len();
    let n_t = T::from_usize(n);

    let mut w = vec![T::ZERO; d];
    let mut b = T::ZERO;

    for _ in 0..epochs {
        let mut dw = vec![T::ZERO; d];
        let mut db = T::ZERO;
        for (row, &target) in x.iter().zip(y.iter()) {
            let pred = row
                .iter()
                .zip(w.iter())
                .fold(b, |acc, (&v, &wj)| acc + v * wj);
            let error = pred - target;
            for (g, &v) in dw.iter_mut().zip(row.iter()) {
                *g += error * v;
            }
            db += error;
        }
        for j in 0..d {
            let grad = dw[j] * T::TWO / n_t + alpha * T::TWO * w[j] / n_t;
            w[j] -= learning_rate * grad;
        }
        b -= learning_rate * db * T::TWO / n_t;
    }

    Ok(Coefficients { weights: w, bias: b })
}

/// Ordinary least squares regression, `y = Xw + b`.
pub struct LinearRegression<T: Float> {
    pub solver: Solver<T>,
    coef: Option<Coefficients<T>>,
}

impl<T: Float> LinearRegression<T> {
    pub fn new() -> Self {
        LinearRegression {
            solver: Solver::Normal,
            coef: None,
        }
    }

    pub fn with_solver(mut self, solver: Solver<T>) -> Self {
        self.solver = solver;
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[T]) -> MlResult<()> {
        check_paired(x, y)?;
        self.solver.validate()?;
        self.coef = Some(match self.solver {
            Solver::Normal => fit_normal(x, y, T::ZERO)?,
            Solver::GradientDescent {
                learning_rate,
                epochs,
            } => fit_gradient_descent(x, y, T::ZERO, learning_rate, epochs)?,
        });
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        let coef = self
            .coef
            .as_ref()
            .ok_or(MlError::NotFitted("LinearRegression"))?;
        predict_with(coef, x)
    }

    /// R² on the given data.
    pub fn score(&self, x: &[Vec<T>], y: &[T]) -> MlResult<f64> {
        let pred = self.predict(x)?;
        r2_score(y, &pred)
    }

    pub fn weights(&self) -> MlResult<&[T]> {
        self.coef
            .as_ref()
            .map(|c| c.weights.as_slice())
            .ok_or(MlError::NotFitted("LinearRegression"))
    }

    pub fn bias(&self) -> MlResult<T> {
        self.coef
            .as_ref()
            .map(|c| c.bias)
            .ok_or(MlError::NotFitted("LinearRegression"))
    }
}

impl<T: Float> Default for LinearRegression<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// L2-regularized linear regression.
pub struct Ridge<T: Float> {
    pub alpha: T,
    pub solver: Solver<T>,
    coef: Option<Coefficients<T>>,
}

impl<T: Float> Ridge<T> {
    pub fn new(alpha: T) -> Self {
        Ridge {
            alpha,
            solver: Solver::Normal,
            coef: None,
        }
    }

    pub fn with_solver(mut self, solver: Solver<T>) -> Self {
        self.solver = solver;
        self
    }

    pub fn fit(&mut self, x: &[Vec<T>], y: &[T]) -> MlResult<()> {
        check_paired(x, y)?;
        self.solver.validate()?;
        if self.alpha < T::ZERO {
            return Err(MlError::InvalidConfiguration(format!(
                "alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        self.coef = Some(match self.solver {
            Solver::Normal => fit_normal(x, y, self.alpha)?,
            Solver::GradientDescent {
                learning_rate,
                epochs,
            } => fit_gradient_descent(x, y, self.alpha, learning_rate, epochs)?,
        });
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<T>]) -> MlResult<Vec<T>> {
        let coef = self.coef.as_ref().ok_or(MlError::NotFitted("Ridge"))?;
        predict_with(coef, x)
    }

    pub fn score(&self, x: &[Vec<T>], y: &[T]) -> MlResult<f64> {
        let pred = self.predict(x)?;
        r2_score(y, &pred)
    }

    pub fn weights(&self) -> MlResult<&[T]> {
        self.coef
            .as_ref()
            .map(|c| c.weights.as_slice())
            .ok_or(MlError::NotFitted("Ridge"))
    }
}

impl<T: Float> Default for Ridge<T> {
    fn default() -> Self {
        Self::new(T::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2·x1 + 3·x2 + 1
        let x = vec![
            vec![1.0, 2.0],
            vec![2.0, 1.0],
            vec![3.0, 4.0],
            vec![4.0, 3.0],
            vec![5.0, 5.0],
        ];
        let y = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1] + 1.0).collect();
        (x, y)
    }

    #[test]
    fn test_normal_equations_exact() {
        let (x, y) = linear_data();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let w = model.weights().unwrap();
        assert_relative_eq!(w[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(w[1], 3.0, epsilon = 1e-8);
        assert_relative_eq!(model.bias().unwrap(), 1.0, epsilon = 1e-8);
        assert_relative_eq!(model.score(&x, &y).unwrap(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_gradient_descent_converges() {
        let (x, y) = linear_data();
        let mut model = LinearRegression::new().with_solver(Solver::GradientDescent {
            learning_rate: 0.01,
            epochs: 20_000,
        });
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.999);
    }

    #[test]
    fn test_ridge_close_to_ols_for_tiny_alpha() {
        let (x, y) = linear_data();
        let mut model = Ridge::new(1e-8);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert_relative_eq!(*p, *t, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_ridge_shrinks_weights() {
        let (x, y) = linear_data();
        let mut ols = LinearRegression::new();
        ols.fit(&x, &y).unwrap();
        let mut ridge = Ridge::new(10.0);
        ridge.fit(&x, &y).unwrap();
        let norm = |w: &[f64]| w.iter().map(|v| v * v).sum::<f64>();
        assert!(norm(ridge.weights().unwrap()) < norm(ols.weights().unwrap()));
    }

    #[test]
    fn test_predict_before_fit() {
        let model: LinearRegression<f64> = LinearRegression::new();
        assert_eq!(
            model.predict(&[vec![1.0]]),
            Err(MlError::NotFitted("LinearRegression"))
        );
    }

    #[test]
    fn test_mismatched_inputs() {
        let mut model = LinearRegression::new();
        assert!(matches!(
            model.fit(&[vec![1.0_f64]], &[1.0, 2.0]),
            Err(MlError::DimensionMismatch(_))
        ));
        let empty: Vec<Vec<f64>> = vec![];
        assert_eq!(model.fit(&empty, &[]), Err(MlError::EmptyInput));
    }

    #[test]
    fn test_invalid_learning_rate() {
        let (x, y) = linear_data();
        let mut model = LinearRegression::new().with_solver(Solver::GradientDescent {
            learning_rate: -0.1,
            epochs: 10,
        });
        assert!(matches!(
            model.fit(&x, &y),
            Err(MlError::InvalidConfiguration(_))
        ));
    }
}
