use ember_ml_core::{Float, MlError, MlResult};

/// Solve the square system `A·w = b` by Gaussian elimination with partial
/// pivoting. `a` is row-major n×n and consumed along with `b`.
pub(crate) fn solve_system<T: Float>(mut a: Vec<T>, mut b: Vec<T>, n: usize) -> MlResult<Vec<T>> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n);

    for col in 0..n {
        // Pivot on the largest remaining entry in this column.
        let mut pivot = col;
        for row in col + 1..n {
            if a[row * n + col].abs() > a[pivot * n + col].abs() {
                pivot = row;
            }
        }
        if a[pivot * n + col].abs() < T::from_f64(1e-12) {
            return Err(MlError::SingularMatrix);
        }
        if pivot != col {
            for k in 0..n {
                a.swap(col * n + k, pivot * n + k);
            }
            b.swap(col, pivot);
        }

        let diag = a[col * n + col];
        for row in col + 1..n {
            let factor = a[row * n + col] / diag;
            if factor == T::ZERO {
                continue;
            }
            for k in col..n {
                let v = a[col * n + k];
                a[row * n + k] -= factor * v;
            }
            let bv = b[col];
            b[row] -= factor * bv;
        }
    }

    // Back substitution.
    let mut w = vec![T::ZERO; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row * n + k] * w[k];
        }
        w[row] = sum / a[row * n + row];
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_2x2() {
        // 2x + y = 5, x + 3y = 10 → x = 1, y = 3
        let a = vec![2.0_f64, 1.0, 1.0, 3.0];
        let b = vec![5.0, 10.0];
        let w = solve_system(a, b, 2).unwrap();
        assert!((w[0] - 1.0).abs() < 1e-10);
        assert!((w[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero leading entry forces a row swap.
        let a = vec![0.0_f64, 1.0, 1.0, 0.0];
        let b = vec![2.0, 3.0];
        let w = solve_system(a, b, 2).unwrap();
        assert!((w[0] - 3.0).abs() < 1e-10);
        assert!((w[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_singular() {
        let a = vec![1.0_f64, 2.0, 2.0, 4.0];
        let b = vec![1.0, 2.0];
        assert_eq!(solve_system(a, b, 2), Err(MlError::SingularMatrix));
    }
}
