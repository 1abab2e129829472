//! Row-block distributed multiply.
//!
//! The coordinator scatters contiguous row blocks of `A` and broadcasts all of
//! `B`; each rank multiplies its rows, the coordinator gathers the row blocks
//! of `C`, and per-rank compute times are max-reduced onto it.

use crate::distributed::comm::{Communicator, LocalCluster, Message, COORDINATOR};
use crate::error::{communication_error, configuration_error, dimension_mismatch, Result};
use crate::matrix::{Element, Matrix};
use crate::utils::Timer;

/// Coordinator-side result of a row-block run.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBlockOutcome<T> {
    pub product: Matrix<T>,
    /// Longest compute time over all ranks, in seconds.
    pub max_compute_seconds: f64,
}

/// Runs one row-block multiplication on the calling rank.
///
/// # Errors
///
/// Every rank returns a configuration error when `n` is not a multiple of the
/// group size; only `n` has been broadcast at that point.
pub fn row_block_multiply<T, C>(
    comm: &C,
    operands: Option<(&Matrix<T>, &Matrix<T>)>,
) -> Result<Option<RowBlockOutcome<T>>>
where
    T: Element,
    C: Communicator<T>,
{
    let rank = comm.rank();
    let size = comm.size();

    let operands = if comm.is_coordinator() {
        let (a, b) = operands
            .ok_or_else(|| configuration_error("the coordinator needs both operands"))?;
        if a.n() != b.n() {
            return Err(dimension_mismatch(a.n(), b.n(), "operands must have the same side"));
        }
        Some((a, b))
    } else {
        None
    };

    let header = operands.map(|(a, _)| Message::Table(vec![a.n()]));
    let n = *comm
        .broadcast(COORDINATOR, header)?
        .into_table(rank)?
        .first()
        .ok_or_else(|| communication_error(rank, "empty size table"))?;
    if n % size != 0 {
        return Err(configuration_error(format!(
            "matrix side {n} is not divisible by {size} processes"
        )));
    }
    let rows = n / size;

    let local_a = match operands {
        Some((a, _)) => {
            let counts = vec![rows * n; size];
            let displs: Vec<usize> = (0..size).map(|r| r * rows * n).collect();
            comm.scatterv(COORDINATOR, Some((a.as_slice(), counts.as_slice(), displs.as_slice())))?
        }
        None => comm.scatterv(COORDINATOR, None)?,
    };
    let b = comm
        .broadcast(COORDINATOR, operands.map(|(_, b)| Message::Block(b.as_slice().to_vec())))?
        .into_block(rank)?;
    if local_a.len() != rows * n || b.len() != n * n {
        return Err(communication_error(rank, "received blocks of the wrong size"));
    }

    let timer = Timer::start();
    let local_c = multiply_rows(&local_a, &b, rows, n);
    let elapsed = timer.elapsed();
    log::debug!("rank {rank}: {rows} rows in {elapsed:.4}s");

    let gathered = comm.gather(COORDINATOR, local_c)?;
    let max = comm.reduce_max(COORDINATOR, elapsed)?;

    match (gathered, max) {
        (Some(blocks), Some(max_compute_seconds)) => {
            let product = Matrix::from_vec(n, blocks.concat())?;
            Ok(Some(RowBlockOutcome {
                product,
                max_compute_seconds,
            }))
        }
        _ => Ok(None),
    }
}

/// `rows x n` block of `C` from the matching rows of `A` and all of `B`.
fn multiply_rows<T: Element>(a: &[T], b: &[T], rows: usize, n: usize) -> Vec<T> {
    let mut c = vec![T::zero(); rows * n];
    for i in 0..rows {
        let c_row = &mut c[i * n..(i + 1) * n];
        for k in 0..n {
            let a_ik = a[i * n + k];
            for (c_ij, &b_kj) in c_row.iter_mut().zip(&b[k * n..(k + 1) * n]) {
                *c_ij = *c_ij + a_ik * b_kj;
            }
        }
    }
    c
}

/// Runs [`row_block_multiply`] on an in-process cluster of `workers` ranks.
pub fn run_row_block_local<T: Element>(
    workers: usize,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<RowBlockOutcome<T>> {
    let cluster = LocalCluster::new(workers)?;
    let results = cluster.run::<T, _, _>(|comm| {
        row_block_multiply(comm, comm.is_coordinator().then_some((a, b)))
    })?;
    results
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| communication_error(COORDINATOR, "coordinator produced no result"))
}
