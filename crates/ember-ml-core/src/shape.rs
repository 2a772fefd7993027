use crate::error::{MlError, MlResult};
use serde::{Deserialize, Serialize};

/// Ordered dimension sizes of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Size along a specific axis.
    pub fn dim(&self, axis: usize) -> MlResult<usize> {
        self.dims.get(axis).copied().ok_or(MlError::InvalidAxis {
            axis,
            ndim: self.ndim(),
        })
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.dims.clone()
    }

    /// Row-major (C-order) strides.
    pub fn strides(&self) -> Vec<usize> {
        if self.dims.is_empty() {
            return vec![];
        }
        let mut strides = vec![1usize; self.dims.len()];
        for i in (0..self.dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Shape after applying the axis permutation `axes`.
    ///
    /// `axes` must name every axis exactly once.
    pub fn permuted(&self, axes: &[usize]) -> MlResult<Shape> {
        if axes.len() != self.ndim() {
            return Err(MlError::DimensionMismatch(format!(
                "permutation names {} axes for a rank-{} tensor",
                axes.len(),
                self.ndim()
            )));
        }
        let mut seen = vec![false; self.ndim()];
        for &a in axes {
            if a >= self.ndim() || seen[a] {
                return Err(MlError::InvalidAxis {
                    axis: a,
                    ndim: self.ndim(),
                });
            }
            seen[a] = true;
        }
        Ok(Shape::new(axes.iter().map(|&a| self.dims[a]).collect()))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_basics() {
        let s = Shape::new(vec![3, 4, 5]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 60);
        assert_eq!(s.dim(1).unwrap(), 4);
        assert!(s.dim(3).is_err());
    }

    #[test]
    fn test_strides() {
        let s = Shape::new(vec![3, 4, 5]);
        assert_eq!(s.strides(), vec![20, 5, 1]);

        let s2 = Shape::new(vec![2, 3]);
        assert_eq!(s2.strides(), vec![3, 1]);
    }

    #[test]
    fn test_permuted() {
        let s = Shape::new(vec![2, 3, 4]);
        let p = s.permuted(&[2, 0, 1]).unwrap();
        assert_eq!(p.dims(), &[4, 2, 3]);

        assert!(s.permuted(&[0, 1]).is_err());
        assert!(s.permuted(&[0, 0, 1]).is_err());
    }
}
