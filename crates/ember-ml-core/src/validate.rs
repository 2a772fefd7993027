//! Checks for the plain sample-by-feature arrays consumed by the classical
//! estimators and preprocessing transformers.

use crate::dtype::Float;
use crate::error::{MlError, MlResult};

/// Verify `x` is a non-empty rectangular matrix; returns the feature count.
pub fn feature_count<T: Float>(x: &[Vec<T>]) -> MlResult<usize> {
    let first = x.first().ok_or(MlError::EmptyInput)?;
    let d = first.len();
    if d == 0 {
        return Err(MlError::EmptyInput);
    }
    for row in x {
        if row.len() != d {
            return Err(MlError::ShapeMismatch {
                expected: vec![x.len(), d],
                got: vec![x.len(), row.len()],
            });
        }
    }
    Ok(d)
}

/// Verify `x` and `y` pair up sample-for-sample; returns the feature count.
pub fn check_paired<T: Float, U>(x: &[Vec<T>], y: &[U]) -> MlResult<usize> {
    if x.len() != y.len() {
        return Err(MlError::DimensionMismatch(format!(
            "x has {} samples but y has {}",
            x.len(),
            y.len()
        )));
    }
    feature_count(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        let x = vec![vec![1.0_f64, 2.0], vec![3.0, 4.0]];
        assert_eq!(feature_count(&x).unwrap(), 2);

        let empty: Vec<Vec<f64>> = vec![];
        assert_eq!(feature_count(&empty), Err(MlError::EmptyInput));

        let ragged = vec![vec![1.0_f64, 2.0], vec![3.0]];
        assert!(matches!(
            feature_count(&ragged),
            Err(MlError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_check_paired() {
        let x = vec![vec![1.0_f64], vec![2.0]];
        assert!(check_paired(&x, &[0usize]).is_err());
        assert_eq!(check_paired(&x, &[0usize, 1]).unwrap(), 1);
    }
}
