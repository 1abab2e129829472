//! Owned square matrices and the element trait shared by every algorithm.

use std::fmt::Debug;

use ndarray::{Array2, ArrayView2};

use crate::error::{dimension_mismatch, Result};
use crate::view::{MatView, MatViewMut};

/// Floating-point element type the multiplication engines operate on.
pub trait Element: num::Float + Send + Sync + Debug + 'static {}

impl<T> Element for T where T: num::Float + Send + Sync + Debug + 'static {}

/// Dense `n x n` matrix in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// Creates a zero-filled matrix of side `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![T::zero(); n * n],
        }
    }

    /// Wraps a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch if `data.len() != n * n`.
    pub fn from_vec(n: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != n * n {
            return Err(dimension_mismatch(
                data.len(),
                n * n,
                "matrix buffer length must equal n * n",
            ));
        }
        Ok(Self { n, data })
    }

    /// Builds a matrix element by element.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    /// Identity matrix of side `n`.
    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, |i, j| if i == j { T::one() } else { T::zero() })
    }

    /// Copies a square `ndarray` view.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch for non-square input.
    pub fn from_array(array: ArrayView2<'_, T>) -> Result<Self> {
        let (rows, cols) = array.dim();
        if rows != cols {
            return Err(dimension_mismatch(rows, cols, "matrix must be square"));
        }
        Ok(Self {
            n: rows,
            data: array.iter().copied().collect(),
        })
    }

    /// Converts into an `ndarray` array without copying.
    pub fn into_array(self) -> Array2<T> {
        let n = self.n;
        Array2::from_shape_vec((n, n), self.data)
            .unwrap_or_else(|_| unreachable!("buffer length is n * n by construction"))
    }

    #[inline(always)]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.n + j]
    }

    /// Read-only view of the whole matrix.
    pub fn view(&self) -> MatView<'_, T> {
        MatView::square(&self.data, self.n)
            .unwrap_or_else(|_| unreachable!("buffer length is n * n by construction"))
    }

    /// Mutable view of the whole matrix.
    pub fn view_mut(&mut self) -> MatViewMut<'_, T> {
        let n = self.n;
        MatViewMut::square(&mut self.data, n)
            .unwrap_or_else(|_| unreachable!("buffer length is n * n by construction"))
    }

    /// Embeds this matrix in the top-left corner of a zero matrix of side `size`.
    pub fn padded(&self, size: usize) -> Self {
        assert!(size >= self.n, "cannot pad {} down to {}", self.n, size);
        if size == self.n {
            return self.clone();
        }
        let mut out = Self::zeros(size);
        for (dst, src) in out
            .data
            .chunks_exact_mut(size)
            .zip(self.data.chunks_exact(self.n.max(1)))
        {
            dst[..self.n].copy_from_slice(src);
        }
        out
    }

    /// Top-left `n x n` corner of this matrix.
    pub fn cropped(&self, n: usize) -> Self {
        assert!(n <= self.n, "cannot crop {} up to {}", self.n, n);
        if n == self.n {
            return self.clone();
        }
        let mut data = Vec::with_capacity(n * n);
        for row in self.data.chunks_exact(self.n).take(n) {
            data.extend_from_slice(&row[..n]);
        }
        Self { n, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Matrix::from_vec(3, vec![0.0f32; 9]).is_ok());
        assert!(Matrix::from_vec(3, vec![0.0f32; 8]).is_err());
    }

    #[test]
    fn test_pad_and_crop() {
        let m = Matrix::from_vec(2, vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let p = m.padded(4);

        assert_eq!(p.n(), 4);
        #[rustfmt::skip]
        let expected = vec![
            1.0, 2.0, 0.0, 0.0,
            3.0, 4.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
        ];
        assert_eq!(p.as_slice(), expected.as_slice());
        assert_eq!(p.cropped(2), m);
    }

    #[test]
    fn test_ndarray_interop() {
        let a = array![[1.0f64, 2.0], [3.0, 4.0]];
        let m = Matrix::from_array(a.view()).unwrap();
        assert_eq!(m.get(1, 0), 3.0);
        assert_eq!(m.into_array(), a);

        let rect = array![[1.0f64, 2.0, 3.0]];
        assert!(Matrix::from_array(rect.view()).is_err());
    }

    #[test]
    fn test_identity() {
        let i = Matrix::<f32>::identity(3);
        assert_eq!(i.get(0, 0), 1.0);
        assert_eq!(i.get(0, 1), 0.0);
        assert_eq!(i.get(2, 2), 1.0);
    }
}
