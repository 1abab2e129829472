//! Base-case kernels.
//!
//! [`multiply_accumulate`] is the floor of every recursive algorithm in the
//! crate. It walks `i, k, j` so the innermost loop streams over contiguous
//! rows of `B` and `C` and vectorizes. The `k` and `j` loops are blocked by
//! [`KC`] and [`NC`]; for any output element the `k` terms are still summed in
//! ascending order, so blocking never changes the result.
//!
//! All kernels only touch the output view they are handed, which makes them
//! safe to run concurrently on disjoint quadrants.

use std::cmp::min;

use crate::matrix::Element;
use crate::view::{MatView, MatViewMut};
use crate::{KC, NC};

/// `C += A * B` for three `n x n` views.
///
/// # Panics
///
/// Panics if the three views do not share the same side.
pub fn multiply_accumulate<T: Element>(a: &MatView<'_, T>, b: &MatView<'_, T>, c: &mut MatViewMut<'_, T>) {
    let n = a.n();
    assert_eq!(n, b.n(), "kernel operands must have equal sides");
    assert_eq!(n, c.n(), "kernel output must match operand side");

    for kk in (0..n).step_by(KC) {
        let k_end = min(kk + KC, n);
        for jj in (0..n).step_by(NC) {
            let j_end = min(jj + NC, n);
            for i in 0..n {
                let a_row = a.row(i);
                let c_row = &mut c.row_mut(i)[jj..j_end];
                for (k, &a_ik) in a_row.iter().enumerate().take(k_end).skip(kk) {
                    let b_row = &b.row(k)[jj..j_end];
                    for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
                        *c_ij = *c_ij + a_ik * b_kj;
                    }
                }
            }
        }
    }
}

/// `C = A * B`: zeroes the output, then accumulates.
pub fn multiply_overwrite<T: Element>(a: &MatView<'_, T>, b: &MatView<'_, T>, c: &mut MatViewMut<'_, T>) {
    c.fill(T::zero());
    multiply_accumulate(a, b, c);
}

/// `out = a + b`.
pub fn add_into<T: Element>(a: &MatView<'_, T>, b: &MatView<'_, T>, out: &mut MatViewMut<'_, T>) {
    zip_into(a, b, out, |x, y| x + y);
}

/// `out = a - b`.
pub fn sub_into<T: Element>(a: &MatView<'_, T>, b: &MatView<'_, T>, out: &mut MatViewMut<'_, T>) {
    zip_into(a, b, out, |x, y| x - y);
}

#[inline(always)]
fn zip_into<T: Element>(
    a: &MatView<'_, T>,
    b: &MatView<'_, T>,
    out: &mut MatViewMut<'_, T>,
    op: impl Fn(T, T) -> T,
) {
    let n = out.n();
    assert_eq!(n, a.n(), "elementwise operands must have equal sides");
    assert_eq!(n, b.n(), "elementwise operands must have equal sides");
    for i in 0..n {
        for ((o, &x), &y) in out.row_mut(i).iter_mut().zip(a.row(i)).zip(b.row(i)) {
            *o = op(x, y);
        }
    }
}
