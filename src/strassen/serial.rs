//! Serial Strassen recursion over a single arena.
//!
//! Every level claims its nine blocks from the cursor and hands the remainder
//! to its seven children, which run one after another and therefore reuse the
//! same region for their own levels.

use crate::error::Result;
use crate::kernel::multiply_overwrite;
use crate::matrix::Element;
use crate::strassen::products::{combine, Operand, Product};
use crate::view::{MatView, MatViewMut};
use crate::workspace::{decomposes, ArenaCursor, LevelBlocks};

/// `C = A * B` by serial Strassen recursion down to `threshold`.
///
/// `cursor` must cover at least `workspace::size_for(n, threshold)` elements.
///
/// # Errors
///
/// Returns a workspace error if the arena is too small.
pub fn multiply<T: Element>(
    a: MatView<'_, T>,
    b: MatView<'_, T>,
    mut c: MatViewMut<'_, T>,
    cursor: ArenaCursor<'_, T>,
    threshold: usize,
) -> Result<()> {
    let n = a.n();
    if !decomposes(n, threshold) {
        multiply_overwrite(&a, &b, &mut c);
        return Ok(());
    }

    let m = n / 2;
    let (level, mut next) = cursor.take_level(m)?;
    let LevelBlocks {
        mut products,
        t1,
        t2,
    } = level;

    for (p, out) in Product::ALL.into_iter().zip(products.iter_mut()) {
        let (left, right) = p.operands();
        let lhs = operand_view(left, a, &mut *t1, m)?;
        let rhs = operand_view(right, b, &mut *t2, m)?;
        multiply(
            lhs,
            rhs,
            MatViewMut::square(&mut **out, m)?,
            next.reborrow(),
            threshold,
        )?;
    }

    combine(products.each_ref().map(|p| &**p), &mut c);
    Ok(())
}

/// View of one product operand: the quadrant itself, or its sum/difference
/// materialized into `scratch`.
pub(crate) fn operand_view<'v, T: Element>(
    op: Operand,
    parent: MatView<'v, T>,
    scratch: &'v mut [T],
    m: usize,
) -> Result<MatView<'v, T>> {
    match op {
        Operand::Quadrant(q) => Ok(parent.quadrant(q)),
        _ => {
            op.materialize(
                |q| parent.quadrant(q),
                &mut MatViewMut::square(&mut *scratch, m)?,
            );
            MatView::square(scratch, m)
        }
    }
}
