//! Tiled parallel multiply over row bands.

use std::cmp::min;

use rayon::prelude::*;

use crate::error::{configuration_error, dimension_mismatch, Result};
use crate::matrix::{Element, Matrix};
use crate::scheduler::RayonScheduler;

/// Default tile side used by the binary.
pub const DEFAULT_TILE: usize = 64;

/// Computes `C = A * B` with bands of `tile` rows of `C` processed in parallel.
///
/// Parallelism strategy:
/// - Rows of `C` are split into bands of `tile` rows with `par_chunks_mut`;
///   each band is owned by exactly one task.
/// - Inside a band the `jj` and `kk` tile loops are serial, and each tile is
///   an `i, k, j` loop over contiguous rows of `B` and `C`.
///
/// # Arguments
///
/// * `a` - Left operand.
/// * `b` - Right operand, same side as `a`.
/// * `tile` - Tile side; must be at least 1.
/// * `scheduler` - Pool the bands run on.
///
/// # Errors
///
/// Returns a dimension mismatch for unequal sides or a configuration error
/// for a zero tile.
pub fn par_multiply<T: Element>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    tile: usize,
    scheduler: &RayonScheduler,
) -> Result<Matrix<T>> {
    let n = a.n();
    if n != b.n() {
        return Err(dimension_mismatch(n, b.n(), "operands must have the same side"));
    }
    if tile == 0 {
        return Err(configuration_error("tile size must be at least 1"));
    }

    let mut c = Matrix::zeros(n);
    if n == 0 {
        return Ok(c);
    }
    let (a, b) = (a.as_slice(), b.as_slice());

    scheduler.install(|| {
        c.as_mut_slice()
            .par_chunks_mut(n * tile)
            .enumerate()
            .for_each(|(band, c_band)| {
                let ii = band * tile;
                let rows = c_band.len() / n;
                for jj in (0..n).step_by(tile) {
                    let j_end = min(jj + tile, n);
                    for kk in (0..n).step_by(tile) {
                        let k_end = min(kk + tile, n);
                        for r in 0..rows {
                            let i = ii + r;
                            let c_row = &mut c_band[r * n + jj..r * n + j_end];
                            for k in kk..k_end {
                                let a_ik = a[i * n + k];
                                let b_row = &b[k * n + jj..k * n + j_end];
                                for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
                                    *c_ij = *c_ij + a_ik * b_kj;
                                }
                            }
                        }
                    }
                }
            });
    });
    Ok(c)
}
