use ember_ml_core::{Float, MlError, MlResult};

fn check<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<()> {
    if y_true.is_empty() {
        return Err(MlError::EmptyInput);
    }
    if y_true.len() != y_pred.len() {
        return Err(MlError::DimensionMismatch(format!(
            "y_true has {} entries but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Mean squared error.
pub fn mse<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<f64> {
    check(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            let d = (t - p).to_f64();
            d * d
        })
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Root mean squared error.
pub fn rmse<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<f64> {
    Ok(mse(y_true, y_pred)?.sqrt())
}

/// Mean absolute error.
pub fn mae<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<f64> {
    check(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).to_f64().abs())
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// R² coefficient of determination. Constant targets score 0.
pub fn r2_score<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<f64> {
    check(y_true, y_pred)?;
    let n = y_true.len() as f64;
    let mean: f64 = y_true.iter().map(|v| v.to_f64()).sum::<f64>() / n;

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            let d = t.to_f64() - p.to_f64();
            d * d
        })
        .sum();
    let ss_tot: f64 = y_true
        .iter()
        .map(|&t| {
            let d = t.to_f64() - mean;
            d * d
        })
        .sum();

    if ss_tot < 1e-15 {
        return Ok(0.0);
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Mean absolute percentage error, in percent. Zero targets are skipped.
pub fn mape<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<f64> {
    check(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            let t = t.to_f64();
            if t.abs() < 1e-15 {
                0.0
            } else {
                ((t - p.to_f64()) / t).abs()
            }
        })
        .sum();
    Ok(sum / y_true.len() as f64 * 100.0)
}

/// Explained variance: 1 − Var(y − ŷ) / Var(y).
pub fn explained_variance<T: Float>(y_true: &[T], y_pred: &[T]) -> MlResult<f64> {
    check(y_true, y_pred)?;
    let n = y_true.len() as f64;
    let residuals: Vec<f64> = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| t.to_f64() - p.to_f64())
        .collect();

    let res_mean = residuals.iter().sum::<f64>() / n;
    let var_res = residuals
        .iter()
        .map(|&r| (r - res_mean) * (r - res_mean))
        .sum::<f64>()
        / n;

    let y_mean: f64 = y_true.iter().map(|v| v.to_f64()).sum::<f64>() / n;
    let var_y: f64 = y_true
        .iter()
        .map(|v| {
            let d = v.to_f64() - y_mean;
            d * d
        })
        .sum::<f64>()
        / n;

    if var_y < 1e-15 {
        return Ok(0.0);
    }
    Ok(1.0 - var_res / var_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mse_rmse() {
        let y_true = [1.0, 2.0, 3.0];
        let y_pred = [1.0, 2.0, 5.0];
        assert_relative_eq!(mse(&y_true, &y_pred).unwrap(), 4.0 / 3.0);
        assert_relative_eq!(rmse(&y_true, &y_pred).unwrap(), (4.0_f64 / 3.0).sqrt());
    }

    #[test]
    fn test_mae() {
        let y_true = [1.0, 2.0, 3.0];
        let y_pred = [1.5, 2.5, 3.5];
        assert_relative_eq!(mae(&y_true, &y_pred).unwrap(), 0.5);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y_true = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(r2_score(&y_true, &y_true).unwrap(), 1.0);
        // Predicting the mean everywhere scores exactly 0.
        let mean_pred = [2.5; 4];
        assert_relative_eq!(r2_score(&y_true, &mean_pred).unwrap(), 0.0);
    }

    #[test]
    fn test_mape() {
        let y_true = [10.0, 20.0];
        let y_pred = [9.0, 22.0];
        assert_relative_eq!(mape(&y_true, &y_pred).unwrap(), 10.0);
    }

    #[test]
    fn test_explained_variance_shift_invariant() {
        // A constant offset leaves residual variance at zero.
        let y_true = [1.0, 2.0, 3.0, 4.0];
        let y_pred = [2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(explained_variance(&y_true, &y_pred).unwrap(), 1.0);
        assert!(r2_score(&y_true, &y_pred).unwrap() < 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(mse(&[1.0], &[1.0, 2.0]).is_err());
        assert!(mae::<f64>(&[], &[]).is_err());
    }
}
