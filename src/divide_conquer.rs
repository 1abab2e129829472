//! Eight-product divide-and-conquer multiply.
//!
//! Each level splits into quadrants and accumulates
//! `C_ij += A_i1 * B_1j + A_i2 * B_2j`. Both terms of one quadrant write the
//! same output block, so they must not overlap in time.
//!
//! - [`multiply`] runs the first term of all four quadrants as one wave, joins,
//!   then runs the second wave.
//! - [`blocked_multiply`] gives each quadrant one task that runs both terms
//!   in order, and stops forking once a quadrant is within twice the block size.

use crate::error::{dimension_mismatch, Result};
use crate::kernel::multiply_accumulate;
use crate::matrix::Element;
use crate::scheduler::{Task, TaskScheduler};
use crate::view::{MatView, MatViewMut};

fn check_sides(a: usize, b: usize, c: usize) -> Result<()> {
    if a != b || a != c {
        return Err(dimension_mismatch(
            a,
            if a != b { b } else { c },
            "divide-and-conquer operands must share one side",
        ));
    }
    Ok(())
}

/// `C = A * B` by two-wave recursive decomposition down to `threshold`.
///
/// # Errors
///
/// Returns a dimension mismatch for unequal sides, or the first task failure.
pub fn multiply<T: Element, S: TaskScheduler + ?Sized>(
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    mut c: MatViewMut<'_, T>,
    threshold: usize,
    scheduler: &S,
) -> Result<()> {
    check_sides(a.n(), b.n(), c.n())?;
    c.fill(T::zero());
    two_waves(a, b, c, threshold.max(1), scheduler)
}

fn two_waves<T: Element, S: TaskScheduler + ?Sized>(
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    mut c: MatViewMut<'_, T>,
    threshold: usize,
    scheduler: &S,
) -> Result<()> {
    let n = a.n();
    if n <= threshold || n % 2 != 0 {
        multiply_accumulate(&a, &b, &mut c);
        return Ok(());
    }

    let [a11, a12, a21, a22] = a.quadrants();
    let [b11, b12, b21, b22] = b.quadrants();
    let waves = [
        [(a11, b11), (a11, b12), (a21, b11), (a21, b12)],
        [(a12, b21), (a12, b22), (a22, b21), (a22, b22)],
    ];

    for wave in waves {
        let tasks: Vec<Task<'_>> = wave
            .into_iter()
            .zip(c.quadrants_mut())
            .map(|((x, y), out)| {
                Box::new(move || two_waves(x, y, out, threshold, scheduler)) as Task<'_>
            })
            .collect();
        scheduler.fork_join(tasks)?;
    }
    Ok(())
}

/// `C = A * B` with one task per output quadrant, forking only while the
/// side exceeds `2 * block_size`.
///
/// # Errors
///
/// Returns a dimension mismatch for unequal sides, or the first task failure.
pub fn blocked_multiply<T: Element, S: TaskScheduler + ?Sized>(
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    mut c: MatViewMut<'_, T>,
    block_size: usize,
    scheduler: &S,
) -> Result<()> {
    check_sides(a.n(), b.n(), c.n())?;
    c.fill(T::zero());
    per_quadrant(a, b, c, block_size.max(1), scheduler)
}

fn per_quadrant<T: Element, S: TaskScheduler + ?Sized>(
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    mut c: MatViewMut<'_, T>,
    block_size: usize,
    scheduler: &S,
) -> Result<()> {
    let n = a.n();
    if n <= block_size || n % 2 != 0 {
        multiply_accumulate(&a, &b, &mut c);
        return Ok(());
    }

    let [a11, a12, a21, a22] = a.quadrants();
    let [b11, b12, b21, b22] = b.quadrants();
    let terms = [
        [(a11, b11), (a12, b21)],
        [(a11, b12), (a12, b22)],
        [(a21, b11), (a22, b21)],
        [(a21, b12), (a22, b22)],
    ];

    if n <= 2 * block_size {
        for (pair, mut out) in terms.into_iter().zip(c.quadrants_mut()) {
            for (x, y) in pair {
                per_quadrant(x, y, out.reborrow(), block_size, scheduler)?;
            }
        }
        return Ok(());
    }

    let tasks: Vec<Task<'_>> = terms
        .into_iter()
        .zip(c.quadrants_mut())
        .map(|(pair, mut out)| {
            Box::new(move || -> Result<()> {
                for (x, y) in pair {
                    per_quadrant(x, y, out.reborrow(), block_size, scheduler)?;
                }
                Ok(())
            }) as Task<'_>
        })
        .collect();
    scheduler.fork_join(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::scheduler::{RayonScheduler, SequentialScheduler};

    fn operands(n: usize) -> (Matrix<f64>, Matrix<f64>, Matrix<f64>) {
        let a = Matrix::from_fn(n, |i, j| ((i * 7 + j * 3) % 11) as f64 - 5.0);
        let b = Matrix::from_fn(n, |i, j| ((i * 2 + j * 5) % 13) as f64 - 6.0);
        let reference = crate::utils::naive_multiply(&a, &b).unwrap();
        (a, b, reference)
    }

    #[test]
    fn test_two_waves_exact() {
        let scheduler = RayonScheduler::new(Some(4)).unwrap();
        for (n, threshold) in [(1, 1), (8, 1), (16, 4), (24, 2), (33, 4), (64, 8)] {
            let (a, b, reference) = operands(n);
            let mut c = Matrix::from_fn(n, |_, _| 99.0);
            multiply(a.view(), b.view(), c.view_mut(), threshold, &scheduler).unwrap();
            assert_eq!(c, reference, "n = {n}, threshold = {threshold}");
        }
    }

    #[test]
    fn test_blocked_exact() {
        let scheduler = RayonScheduler::new(Some(3)).unwrap();
        for (n, block) in [(8, 1), (16, 2), (20, 4), (64, 4), (7, 2)] {
            let (a, b, reference) = operands(n);
            let mut c = Matrix::zeros(n);
            blocked_multiply(a.view(), b.view(), c.view_mut(), block, &scheduler).unwrap();
            assert_eq!(c, reference, "n = {n}, block = {block}");
        }
    }

    #[test]
    fn test_zero_threshold_treated_as_one() {
        let (a, b, reference) = operands(4);
        let mut c = Matrix::zeros(4);
        multiply(a.view(), b.view(), c.view_mut(), 0, &SequentialScheduler).unwrap();
        assert_eq!(c, reference);
    }

    #[test]
    fn test_side_mismatch() {
        let a = Matrix::<f32>::zeros(4);
        let b = Matrix::<f32>::zeros(2);
        let mut c = Matrix::<f32>::zeros(4);
        assert!(multiply(a.view(), b.view(), c.view_mut(), 2, &SequentialScheduler).is_err());
        assert!(blocked_multiply(b.view(), b.view(), c.view_mut(), 2, &SequentialScheduler).is_err());
    }
}
