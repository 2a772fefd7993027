use crate::dtype::Float;
use crate::error::{MlError, MlResult};
use crate::random::rng_from_seed;
use crate::shape::Shape;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shaped numeric array: a flat contiguous `Vec<T>` in row-major (C-order)
/// layout plus an ordered [`Shape`].
///
/// Arithmetic is out-of-place and shape-strict: elementwise binary operations
/// require operands of identical shape and fail with
/// [`MlError::ShapeMismatch`] otherwise. There is no implicit broadcasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> MlResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(MlError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    /// Tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![T::ZERO; s.numel()],
            shape: s,
        }
    }

    /// Tensor filled with ones.
    pub fn ones(shape: Vec<usize>) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![T::ONE; s.numel()],
            shape: s,
        }
    }

    /// Tensor filled with a constant value.
    pub fn full(shape: Vec<usize>, value: T) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![value; s.numel()],
            shape: s,
        }
    }

    /// Identity matrix of size n×n.
    pub fn eye(n: usize) -> Self {
        let mut data = vec![T::ZERO; n * n];
        for i in 0..n {
            data[i * n + i] = T::ONE;
        }
        Tensor {
            data,
            shape: Shape::new(vec![n, n]),
        }
    }

    /// 1-D tensor from a slice.
    pub fn from_slice(data: &[T]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: Shape::new(vec![data.len()]),
        }
    }

    /// 2-D tensor from nested rows.
    pub fn from_vec2d(data: &[Vec<T>]) -> MlResult<Self> {
        if data.is_empty() {
            return Ok(Tensor::zeros(vec![0, 0]));
        }
        let rows = data.len();
        let cols = data[0].len();
        for row in data {
            if row.len() != cols {
                return Err(MlError::ShapeMismatch {
                    expected: vec![rows, cols],
                    got: vec![rows, row.len()],
                });
            }
        }
        let flat: Vec<T> = data.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::new(flat, vec![rows, cols])
    }

    /// Random tensor, uniform in [0, 1).
    pub fn rand(shape: Vec<usize>, seed: Option<u64>) -> Self {
        let s = Shape::new(shape);
        let mut rng = rng_from_seed(seed);
        let data: Vec<T> = (0..s.numel())
            .map(|_| T::from_f64(rand::Rng::gen::<f64>(&mut rng)))
            .collect();
        Tensor { data, shape: s }
    }

    /// Random tensor, standard normal via the Box-Muller transform.
    pub fn randn(shape: Vec<usize>, seed: Option<u64>) -> Self {
        let s = Shape::new(shape);
        let mut rng = rng_from_seed(seed);
        let n = s.numel();
        let mut data = Vec::with_capacity(n + 1);
        while data.len() < n {
            let u1: f64 = rand::Rng::gen::<f64>(&mut rng).max(1e-10);
            let u2: f64 = rand::Rng::gen::<f64>(&mut rng);
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f64::consts::PI * u2;
            data.push(T::from_f64(r * theta.cos()));
            data.push(T::from_f64(r * theta.sin()));
        }
        data.truncate(n);
        Tensor { data, shape: s }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    fn offset(&self, indices: &[usize]) -> MlResult<usize> {
        if indices.len() != self.ndim() {
            return Err(MlError::DimensionMismatch(format!(
                "expected {} indices, got {}",
                self.ndim(),
                indices.len()
            )));
        }
        let strides = self.shape.strides();
        let mut offset = 0;
        for (axis, &idx) in indices.iter().enumerate() {
            let size = self.shape.dim(axis)?;
            if idx >= size {
                return Err(MlError::IndexOutOfBounds {
                    index: idx,
                    axis,
                    size,
                });
            }
            offset += idx * strides[axis];
        }
        Ok(offset)
    }

    /// Element at a multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> MlResult<T> {
        Ok(self.data[self.offset(indices)?])
    }

    /// Set the element at a multi-dimensional index.
    pub fn set(&mut self, indices: &[usize], value: T) -> MlResult<()> {
        let off = self.offset(indices)?;
        self.data[off] = value;
        Ok(())
    }

    /// Extract row `i` of a 2-D tensor as a 1-D tensor.
    pub fn row(&self, i: usize) -> MlResult<Tensor<T>> {
        let rows = self.dim2()?.0;
        let cols = self.shape.dim(1)?;
        if i >= rows {
            return Err(MlError::IndexOutOfBounds {
                index: i,
                axis: 0,
                size: rows,
            });
        }
        Ok(Tensor {
            data: self.data[i * cols..(i + 1) * cols].to_vec(),
            shape: Shape::new(vec![cols]),
        })
    }

    /// Rows `start..end` of a 2-D tensor.
    pub fn slice_rows(&self, start: usize, end: usize) -> MlResult<Tensor<T>> {
        let (rows, cols) = self.dim2()?;
        if start >= end || end > rows {
            return Err(MlError::IndexOutOfBounds {
                index: end,
                axis: 0,
                size: rows,
            });
        }
        Tensor::new(
            self.data[start * cols..end * cols].to_vec(),
            vec![end - start, cols],
        )
    }

    fn dim2(&self) -> MlResult<(usize, usize)> {
        if self.ndim() != 2 {
            return Err(MlError::DimensionMismatch(format!(
                "expected a 2-D tensor, got rank {}",
                self.ndim()
            )));
        }
        Ok((self.shape.dim(0)?, self.shape.dim(1)?))
    }

    // ─── Shape Manipulation ─────────────────────────────────────────────────

    /// Reshape; the element count must be preserved.
    pub fn reshape(&self, new_shape: Vec<usize>) -> MlResult<Tensor<T>> {
        let ns = Shape::new(new_shape);
        if self.numel() != ns.numel() {
            return Err(MlError::ShapeMismatch {
                expected: ns.to_vec(),
                got: self.shape_vec(),
            });
        }
        Ok(Tensor {
            data: self.data.clone(),
            shape: ns,
        })
    }

    /// Flatten to 1-D.
    pub fn flatten(&self) -> Tensor<T> {
        Tensor {
            data: self.data.clone(),
            shape: Shape::new(vec![self.numel()]),
        }
    }

    /// Reorder axes by the given permutation.
    pub fn permute_axes(&self, axes: &[usize]) -> MlResult<Tensor<T>> {
        let new_shape = self.shape.permuted(axes)?;
        let old_strides = self.shape.strides();
        let new_strides = new_shape.strides();
        let n = self.numel();
        let mut data = vec![T::ZERO; n];
        for (flat, slot) in data.iter_mut().enumerate() {
            let mut remaining = flat;
            let mut src = 0;
            for (d, &stride) in new_strides.iter().enumerate() {
                let idx = remaining / stride;
                remaining %= stride;
                src += idx * old_strides[axes[d]];
            }
            *slot = self.data[src];
        }
        Ok(Tensor {
            data,
            shape: new_shape,
        })
    }

    /// Transpose a 2-D tensor.
    pub fn t(&self) -> MlResult<Tensor<T>> {
        self.dim2()?;
        self.permute_axes(&[1, 0])
    }

    // ─── Element-wise Operations ────────────────────────────────────────────

    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> Tensor<T> {
        Tensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    pub fn abs(&self) -> Tensor<T> {
        self.apply(T::abs)
    }

    pub fn exp(&self) -> Tensor<T> {
        self.apply(T::exp)
    }

    pub fn ln(&self) -> Tensor<T> {
        self.apply(T::ln)
    }

    pub fn sqrt(&self) -> Tensor<T> {
        self.apply(T::sqrt)
    }

    pub fn neg(&self) -> Tensor<T> {
        self.apply(|x| -x)
    }

    pub fn powi(&self, n: i32) -> Tensor<T> {
        self.apply(|x| x.powi(n))
    }

    pub fn clamp(&self, min: T, max: T) -> Tensor<T> {
        self.apply(|x| x.max(min).min(max))
    }

    pub fn add_scalar(&self, s: T) -> Tensor<T> {
        self.apply(|x| x + s)
    }

    pub fn sub_scalar(&self, s: T) -> Tensor<T> {
        self.apply(|x| x - s)
    }

    pub fn mul_scalar(&self, s: T) -> Tensor<T> {
        self.apply(|x| x * s)
    }

    pub fn div_scalar(&self, s: T) -> Tensor<T> {
        self.apply(|x| x / s)
    }

    /// Combine two same-shaped tensors elementwise. Any shape difference is
    /// an explicit failure, never a silent reshape.
    fn zip_with<F: Fn(T, T) -> T>(&self, other: &Tensor<T>, op: F) -> MlResult<Tensor<T>> {
        if self.shape != other.shape {
            return Err(MlError::ShapeMismatch {
                expected: self.shape_vec(),
                got: other.shape_vec(),
            });
        }
        let data: Vec<T> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(Tensor {
            data,
            shape: self.shape.clone(),
        })
    }

    pub fn add(&self, other: &Tensor<T>) -> MlResult<Tensor<T>> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Tensor<T>) -> MlResult<Tensor<T>> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Tensor<T>) -> MlResult<Tensor<T>> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Tensor<T>) -> MlResult<Tensor<T>> {
        self.zip_with(other, |a, b| a / b)
    }

    // ─── Matrix Products ────────────────────────────────────────────────────

    /// Dot product of two 1-D tensors.
    pub fn dot(&self, other: &Tensor<T>) -> MlResult<T> {
        if self.ndim() != 1 || other.ndim() != 1 {
            return Err(MlError::DimensionMismatch(
                "dot requires two 1-D tensors".to_string(),
            ));
        }
        if self.numel() != other.numel() {
            return Err(MlError::ShapeMismatch {
                expected: self.shape_vec(),
                got: other.shape_vec(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a * b)
            .sum())
    }

    /// Matrix multiply of two 2-D tensors with matching inner dimension.
    pub fn matmul(&self, other: &Tensor<T>) -> MlResult<Tensor<T>> {
        let (m, k) = self.dim2()?;
        let (k2, n) = other.dim2()?;
        if k != k2 {
            return Err(MlError::DimensionMismatch(format!(
                "matmul: inner dimensions must match, got {} and {}",
                k, k2
            )));
        }
        let mut data = vec![T::ZERO; m * n];
        for i in 0..m {
            for p in 0..k {
                let a = self.data[i * k + p];
                for j in 0..n {
                    data[i * n + j] = data[i * n + j] + a * other.data[p * n + j];
                }
            }
        }
        Tensor::new(data, vec![m, n])
    }

    // ─── Reductions ─────────────────────────────────────────────────────────

    /// Sum over the flattened buffer.
    pub fn sum(&self) -> T {
        self.data.iter().copied().sum()
    }

    /// Mean over the flattened buffer.
    pub fn mean(&self) -> T {
        self.sum() / T::from_usize(self.numel())
    }

    /// Maximum over the flattened buffer.
    pub fn max(&self) -> MlResult<T> {
        self.data
            .iter()
            .copied()
            .reduce(T::max)
            .ok_or(MlError::EmptyInput)
    }

    /// Minimum over the flattened buffer.
    pub fn min(&self) -> MlResult<T> {
        self.data
            .iter()
            .copied()
            .reduce(T::min)
            .ok_or(MlError::EmptyInput)
    }

    /// Flat index of the maximum element.
    pub fn argmax(&self) -> MlResult<usize> {
        if self.data.is_empty() {
            return Err(MlError::EmptyInput);
        }
        let mut best = 0;
        for (i, &v) in self.data.iter().enumerate() {
            if v > self.data[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Flat index of the minimum element.
    pub fn argmin(&self) -> MlResult<usize> {
        if self.data.is_empty() {
            return Err(MlError::EmptyInput);
        }
        let mut best = 0;
        for (i, &v) in self.data.iter().enumerate() {
            if v < self.data[best] {
                best = i;
            }
        }
        Ok(best)
    }

    fn axis_split(&self, axis: usize) -> MlResult<(usize, usize, usize)> {
        let dims = self.shape.dims();
        if axis >= dims.len() {
            return Err(MlError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }
        let outer: usize = dims[..axis].iter().product();
        let inner: usize = dims[axis + 1..].iter().product();
        Ok((outer, dims[axis], inner))
    }

    fn reduced_dims(&self, axis: usize) -> Vec<usize> {
        let mut dims = self.shape.to_vec();
        dims.remove(axis);
        if dims.is_empty() {
            dims.push(1);
        }
        dims
    }

    /// Sum along an axis, collapsing that dimension.
    pub fn sum_axis(&self, axis: usize) -> MlResult<Tensor<T>> {
        let (outer, size, inner) = self.axis_split(axis)?;
        let mut result = vec![T::ZERO; outer * inner];
        for o in 0..outer {
            for a in 0..size {
                for i in 0..inner {
                    result[o * inner + i] =
                        result[o * inner + i] + self.data[o * size * inner + a * inner + i];
                }
            }
        }
        Tensor::new(result, self.reduced_dims(axis))
    }

    /// Mean along an axis.
    pub fn mean_axis(&self, axis: usize) -> MlResult<Tensor<T>> {
        let size = self.shape.dim(axis)?;
        Ok(self.sum_axis(axis)?.div_scalar(T::from_usize(size)))
    }

    /// Population variance along an axis.
    pub fn var_axis(&self, axis: usize) -> MlResult<Tensor<T>> {
        let (outer, size, inner) = self.axis_split(axis)?;
        let mean = self.mean_axis(axis)?;
        let mut result = vec![T::ZERO; outer * inner];
        for o in 0..outer {
            for a in 0..size {
                for i in 0..inner {
                    let diff = self.data[o * size * inner + a * inner + i]
                        - mean.data[o * inner + i];
                    result[o * inner + i] = result[o * inner + i] + diff * diff;
                }
            }
        }
        for v in result.iter_mut() {
            *v = *v / T::from_usize(size);
        }
        Tensor::new(result, self.reduced_dims(axis))
    }

    /// Standard deviation along an axis.
    pub fn std_axis(&self, axis: usize) -> MlResult<Tensor<T>> {
        Ok(self.var_axis(axis)?.sqrt())
    }

    /// Index of the maximum element along an axis, in the flat layout of the
    /// reduced shape.
    pub fn argmax_axis(&self, axis: usize) -> MlResult<Vec<usize>> {
        let (outer, size, inner) = self.axis_split(axis)?;
        if size == 0 {
            return Err(MlError::EmptyInput);
        }
        let mut result = vec![0usize; outer * inner];
        for o in 0..outer {
            for i in 0..inner {
                let mut best = 0usize;
                let mut best_val = self.data[o * size * inner + i];
                for a in 1..size {
                    let v = self.data[o * size * inner + a * inner + i];
                    if v > best_val {
                        best_val = v;
                        best = a;
                    }
                }
                result[o * inner + i] = best;
            }
        }
        Ok(result)
    }

    /// True if any element is NaN.
    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }
}

impl<T: Float> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data == other.data
    }
}

impl<T: Float> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ndim() == 1 {
            write!(f, "tensor([")?;
            for (i, v) in self.data.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                if i > 6 {
                    write!(f, "...")?;
                    break;
                }
                write!(f, "{:.4}", v)?;
            }
            return write!(f, "])");
        }
        write!(f, "tensor(shape={}, numel={})", self.shape, self.numel())
    }
}
