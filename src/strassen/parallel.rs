//! Task-parallel Strassen recursion.
//!
//! Above `max_depth` each node forks its seven products as independent tasks,
//! joins, and only then combines. Every task owns its temporaries and writes a
//! disjoint `m x m` slice of the node's product buffer. At `max_depth` the
//! node switches to the serial recursion with a freshly sized arena of its own,
//! so concurrently running subtrees never share scratch memory.

use crate::config::StrassenConfig;
use crate::error::Result;
use crate::kernel::multiply_overwrite;
use crate::matrix::Element;
use crate::scheduler::{Task, TaskScheduler};
use crate::strassen::products::{combine, Product};
use crate::strassen::serial::{self, operand_view};
use crate::view::{MatView, MatViewMut};
use crate::workspace::{decomposes, Workspace};

/// `C = A * B` starting at recursion depth `depth`.
///
/// # Errors
///
/// Propagates the first task failure; the output is unspecified in that case.
pub fn multiply<T: Element, S: TaskScheduler + ?Sized>(
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    mut c: MatViewMut<'_, T>,
    depth: usize,
    config: &StrassenConfig,
    scheduler: &S,
) -> Result<()> {
    let n = a.n();
    if !decomposes(n, config.threshold) {
        multiply_overwrite(&a, &b, &mut c);
        return Ok(());
    }

    if depth >= config.max_depth {
        let mut workspace = Workspace::new(n, config.threshold);
        return serial::multiply(a, b, c, workspace.cursor(), config.threshold);
    }

    let m = n / 2;
    let block = m * m;
    log::trace!("depth {depth}: forking 7 products of side {m}");

    let mut results = vec![T::zero(); 7 * block];
    let tasks: Vec<Task<'_>> = Product::ALL
        .into_iter()
        .zip(results.chunks_exact_mut(block))
        .map(|(p, out)| {
            Box::new(move || product_task(p, a, b, out, m, depth, config, scheduler)) as Task<'_>
        })
        .collect();
    scheduler.fork_join(tasks)?;

    let products: [&[T]; 7] = std::array::from_fn(|i| &results[i * block..(i + 1) * block]);
    combine(products, &mut c);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn product_task<T: Element, S: TaskScheduler + ?Sized>(
    p: Product,
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    out: &mut [T],
    m: usize,
    depth: usize,
    config: &StrassenConfig,
    scheduler: &S,
) -> Result<()> {
    let (left, right) = p.operands();
    let block = m * m;
    let left_len = if left.needs_temporary() { block } else { 0 };
    let right_len = if right.needs_temporary() { block } else { 0 };

    let mut scratch = vec![T::zero(); left_len + right_len];
    let (s1, s2) = scratch.split_at_mut(left_len);
    let lhs = operand_view(left, a, s1, m)?;
    let rhs = operand_view(right, b, s2, m)?;

    multiply(
        lhs,
        rhs,
        MatViewMut::square(out, m)?,
        depth + 1,
        config,
        scheduler,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::scheduler::{RayonScheduler, SequentialScheduler};

    fn integer_matrix(n: usize, seed: usize) -> Matrix<f64> {
        Matrix::from_fn(n, |i, j| ((i * 5 + j * 3 + seed) % 9) as f64 - 4.0)
    }

    fn run<S: TaskScheduler>(
        a: &Matrix<f64>,
        b: &Matrix<f64>,
        config: &StrassenConfig,
        scheduler: &S,
    ) -> Matrix<f64> {
        let mut c = Matrix::zeros(a.n());
        multiply(a.view(), b.view(), c.view_mut(), 0, config, scheduler).unwrap();
        c
    }

    #[test]
    fn test_parallel_matches_kernel_exactly() {
        let scheduler = RayonScheduler::new(Some(4)).unwrap();
        for n in [8, 16, 24, 32] {
            let a = integer_matrix(n, 1);
            let b = integer_matrix(n, 2);
            let config = StrassenConfig::new().with_threshold(2).with_max_depth(2);

            let mut expected = Matrix::zeros(n);
            crate::kernel::multiply_accumulate(&a.view(), &b.view(), &mut expected.view_mut());

            assert_eq!(run(&a, &b, &config, &scheduler), expected, "n = {n}");
        }
    }

    #[test]
    fn test_depth_switch_is_bitwise_deterministic() {
        let n = 64;
        let a = Matrix::from_fn(n, |i, j| ((i * 31 + j * 17) % 101) as f32 / 101.0);
        let b = Matrix::from_fn(n, |i, j| ((i * 7 + j * 13) % 97) as f32 / 97.0);
        let scheduler = RayonScheduler::new(Some(4)).unwrap();

        let serial = {
            let config = StrassenConfig::new().with_threshold(8).with_max_depth(0);
            let mut c = Matrix::zeros(n);
            multiply(a.view(), b.view(), c.view_mut(), 0, &config, &scheduler).unwrap();
            c
        };
        for max_depth in [1, 2, 3, 10] {
            let config = StrassenConfig::new().with_threshold(8).with_max_depth(max_depth);
            let mut c = Matrix::zeros(n);
            multiply(a.view(), b.view(), c.view_mut(), 0, &config, &scheduler).unwrap();
            assert_eq!(c, serial, "max_depth = {max_depth}");
        }
    }

    #[test]
    fn test_sequential_scheduler_agrees_with_rayon() {
        let n = 32;
        let a = integer_matrix(n, 3);
        let b = integer_matrix(n, 4);
        let config = StrassenConfig::new().with_threshold(4).with_max_depth(3);
        let rayon = RayonScheduler::new(Some(2)).unwrap();

        assert_eq!(
            run(&a, &b, &config, &SequentialScheduler),
            run(&a, &b, &config, &rayon)
        );
    }

    #[test]
    fn test_dyn_scheduler() {
        let n = 16;
        let a = integer_matrix(n, 5);
        let b = Matrix::<f64>::identity(n);
        let config = StrassenConfig::new().with_threshold(2).with_max_depth(1);
        let scheduler: Box<dyn TaskScheduler> = Box::new(SequentialScheduler);

        let mut c = Matrix::zeros(n);
        multiply(a.view(), b.view(), c.view_mut(), 0, &config, scheduler.as_ref()).unwrap();
        assert_eq!(c, a);
    }
}
