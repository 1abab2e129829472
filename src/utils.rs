//! Helpers around the engines: seeded inputs, the naive reference multiply,
//! error measurement and timing.

use std::time::Instant;

use rand::distr::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{dimension_mismatch, Result};
use crate::matrix::{Element, Matrix};

/// Added to the reference norm so an all-zero reference does not divide by zero.
const NORM_EPSILON: f64 = 1e-12;

/// `n x n` matrix of uniform values in `[0, 1)` drawn from a seeded `StdRng`.
///
/// The same `(n, seed)` always yields the same matrix.
///
/// # Arguments
///
/// * `n` - Side of the matrix.
/// * `seed` - Seed for the generator.
pub fn random_matrix<T: Element + SampleUniform>(n: usize, seed: u64) -> Matrix<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    Matrix::from_fn(n, |_, _| rng.random_range(T::zero()..T::one()))
}

/// Serial `i, k, j` triple loop. Used as the correctness oracle.
///
/// # Errors
///
/// Returns a dimension mismatch if the sides differ.
pub fn naive_multiply<T: Element>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
    let n = a.n();
    if n != b.n() {
        return Err(dimension_mismatch(n, b.n(), "operands must have the same side"));
    }
    let (a, b_data) = (a.as_slice(), b.as_slice());
    let mut c = Matrix::zeros(n);
    let out = c.as_mut_slice();
    for i in 0..n {
        for k in 0..n {
            let a_ik = a[i * n + k];
            let b_row = &b_data[k * n..(k + 1) * n];
            for (c_ij, &b_kj) in out[i * n..(i + 1) * n].iter_mut().zip(b_row) {
                *c_ij = *c_ij + a_ik * b_kj;
            }
        }
    }
    Ok(c)
}

/// `sqrt(sum((c - r)^2) / (sum(r^2) + 1e-12))`, accumulated in `f64`.
///
/// # Errors
///
/// Returns a dimension mismatch if the sides differ.
pub fn relative_l2_error<T: Element>(c: &Matrix<T>, reference: &Matrix<T>) -> Result<f64> {
    if c.n() != reference.n() {
        return Err(dimension_mismatch(
            c.n(),
            reference.n(),
            "result and reference must have the same side",
        ));
    }
    let (mut diff, mut norm) = (0.0f64, 0.0f64);
    for (&x, &r) in c.as_slice().iter().zip(reference.as_slice()) {
        let x = x.to_f64().unwrap_or(f64::NAN);
        let r = r.to_f64().unwrap_or(f64::NAN);
        diff += (x - r) * (x - r);
        norm += r * r;
    }
    Ok((diff / (norm + NORM_EPSILON)).sqrt())
}

/// Smallest multiple of `threshold` that is at least `n`.
///
/// # Panics
///
/// Panics if `threshold` is zero.
#[inline]
pub fn padded_size(n: usize, threshold: usize) -> usize {
    n.div_ceil(threshold) * threshold
}

/// Floating-point operations per second of an `n x n` multiply, in GFLOP/s.
pub fn gflops(n: usize, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    2.0 * (n as f64).powi(3) / seconds / 1e9
}

/// Wall-clock stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since [`Timer::start`].
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_matrix_is_seeded() {
        let a = random_matrix::<f32>(16, 123);
        let b = random_matrix::<f32>(16, 123);
        let c = random_matrix::<f32>(16, 456);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_slice().iter().all(|&x| (0.0..1.0).contains(&x)));
    }

    #[test]
    fn test_naive_multiply() {
        let a = Matrix::from_vec(2, vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::from_vec(2, vec![5.0f64, 6.0, 7.0, 8.0]).unwrap();
        let c = naive_multiply(&a, &b).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
        assert!(naive_multiply(&a, &Matrix::zeros(3)).is_err());
    }

    #[test]
    fn test_relative_l2_error() {
        let r = Matrix::from_vec(2, vec![3.0f64, 0.0, 0.0, 4.0]).unwrap();
        assert_eq!(relative_l2_error(&r, &r).unwrap(), 0.0);

        let c = Matrix::from_vec(2, vec![3.0f64, 0.0, 0.0, 9.0]).unwrap();
        let err = relative_l2_error(&c, &r).unwrap();
        assert!((err - 1.0).abs() < 1e-9);

        let zero = Matrix::<f64>::zeros(2);
        assert!(relative_l2_error(&zero, &zero).unwrap().is_finite());
    }

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(256, 128), 256);
        assert_eq!(padded_size(257, 128), 384);
        assert_eq!(padded_size(1, 128), 128);
        assert_eq!(padded_size(0, 128), 0);
        assert_eq!(padded_size(10, 3), 12);
    }

    #[test]
    fn test_gflops() {
        assert_eq!(gflops(1000, 2.0), 1.0);
        assert_eq!(gflops(1000, 0.0), 0.0);
    }
}
