//! Hybrid Strassen: processes for the top-level fan-out, threads below it.
//!
//! Protocol, per multiplication:
//!
//! 1. every rank checks the world size against the topology;
//! 2. the coordinator broadcasts `[n, padded]`, then the send-count and
//!    displacement tables;
//! 3. the coordinator scatters each worker's quadrant blocks and computes
//!    `M1` itself while the workers compute `M2..M7`;
//! 4. products are gathered on the coordinator, combined and cropped.
//!
//! Every product, local or remote, runs through the task-parallel
//! [`Strassen`] engine on its own rank's thread pool.

use crate::config::StrassenConfig;
use crate::distributed::comm::{Communicator, LocalCluster, Message, COORDINATOR};
use crate::distributed::topology::{Assignment, Topology};
use crate::error::{communication_error, configuration_error, dimension_mismatch, Result};
use crate::kernel::{add_into, sub_into};
use crate::matrix::{Element, Matrix};
use crate::strassen::products::{combine, Operand};
use crate::strassen::Strassen;
use crate::utils::padded_size;
use crate::view::MatView;

/// Padded side for the hybrid run: a multiple of the threshold that can be
/// split into quadrants.
pub fn hybrid_padded_size(n: usize, threshold: usize) -> usize {
    let padded = padded_size(n, threshold);
    if padded % 2 == 0 {
        padded
    } else {
        padded + threshold
    }
}

/// Runs one hybrid multiplication on the calling rank.
///
/// The coordinator passes `Some((a, b))` and receives `Some(c)`; workers pass
/// `None` and receive `None`.
///
/// # Errors
///
/// A world size or `config.worker_count` different from seven is a
/// configuration error on every rank, raised before any message is sent.
pub fn hybrid_multiply<T, C>(
    comm: &C,
    config: &StrassenConfig,
    operands: Option<(&Matrix<T>, &Matrix<T>)>,
) -> Result<Option<Matrix<T>>>
where
    T: Element,
    C: Communicator<T>,
{
    let topology = Topology::strassen();
    topology.validate(comm.size())?;
    topology.validate(config.worker_count)?;
    config.validate()?;

    let rank = comm.rank();
    let assignment = topology
        .assignment(rank)
        .ok_or_else(|| communication_error(rank, "rank outside the topology"))?;
    let engine = Strassen::new(*config)?;

    if comm.is_coordinator() {
        let (a, b) = operands
            .ok_or_else(|| configuration_error("the coordinator needs both operands"))?;
        coordinate(comm, &topology, assignment, &engine, a, b).map(Some)
    } else {
        work(comm, assignment, &engine).map(|()| None)
    }
}

fn coordinate<T: Element, C: Communicator<T>>(
    comm: &C,
    topology: &Topology,
    own: &Assignment,
    engine: &Strassen,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<Matrix<T>> {
    let n = a.n();
    if n != b.n() {
        return Err(dimension_mismatch(n, b.n(), "operands must have the same side"));
    }
    let padded = hybrid_padded_size(n, engine.config().threshold);
    let m = padded / 2;
    log::info!(
        "hybrid strassen: n = {n}, padded = {padded}, {} ranks, max_depth = {}",
        comm.size(),
        engine.config().max_depth
    );

    comm.broadcast(COORDINATOR, Some(Message::Table(vec![n, padded])))?;
    let counts = topology.send_counts(m);
    let displs = Topology::displacements(&counts);
    comm.broadcast(COORDINATOR, Some(Message::Table(counts.clone())))?;
    comm.broadcast(COORDINATOR, Some(Message::Table(displs.clone())))?;

    let (pa, pb) = (a.padded(padded), b.padded(padded));
    let send = topology.pack(&pa.view(), &pb.view());
    comm.scatterv(
        COORDINATOR,
        Some((send.as_slice(), counts.as_slice(), displs.as_slice())),
    )?;

    // M1 overlaps with the workers' products.
    let local_blocks = topology.pack_for(COORDINATOR, &pa.view(), &pb.view());
    drop((pa, pb));
    let local = compute_product(own, &local_blocks, m, engine)?;

    let gathered = comm
        .gather(COORDINATOR, local.into_vec())?
        .ok_or_else(|| communication_error(COORDINATOR, "gather returned nothing on the root"))?;

    let mut products: Vec<&[T]> = vec![&[][..]; 7];
    for (asg, block) in topology.assignments().iter().zip(&gathered) {
        if block.len() != m * m {
            return Err(communication_error(
                asg.rank,
                format!("{} has {} elements, expected {}", asg.product, block.len(), m * m),
            ));
        }
        products[asg.product.index()] = block.as_slice();
    }
    let products: [&[T]; 7] = std::array::from_fn(|i| products[i]);

    let mut c = Matrix::zeros(padded);
    combine(products, &mut c.view_mut());
    Ok(c.cropped(n))
}

fn work<T: Element, C: Communicator<T>>(
    comm: &C,
    assignment: &Assignment,
    engine: &Strassen,
) -> Result<()> {
    let rank = comm.rank();
    let sizes = comm.broadcast(COORDINATOR, None)?.into_table(rank)?;
    let counts = comm.broadcast(COORDINATOR, None)?.into_table(rank)?;
    let _displs = comm.broadcast(COORDINATOR, None)?.into_table(rank)?;

    let padded = *sizes
        .get(1)
        .ok_or_else(|| communication_error(rank, "size table is too short"))?;
    let m = padded / 2;
    let expected = *counts
        .get(rank)
        .ok_or_else(|| communication_error(rank, "count table is too short"))?;

    let blocks = comm.scatterv(COORDINATOR, None)?;
    if blocks.len() != expected || expected != assignment.block_count() * m * m {
        return Err(communication_error(
            rank,
            format!("received {} elements, expected {}", blocks.len(), expected),
        ));
    }

    log::info!("rank {rank}: computing {} on {m} x {m} blocks", assignment.product);
    let product = compute_product(assignment, &blocks, m, engine)?;
    comm.gather(COORDINATOR, product.into_vec())?;
    Ok(())
}

/// Builds both operands of `assignment.product` from its packed blocks and
/// multiplies them.
fn compute_product<T: Element>(
    assignment: &Assignment,
    blocks: &[T],
    m: usize,
    engine: &Strassen,
) -> Result<Matrix<T>> {
    let (left, right) = assignment.product.operands();
    let (a_part, b_part) = blocks.split_at(assignment.a_blocks.len() * m * m);
    let lhs = evaluate(left, a_part, m)?;
    let rhs = evaluate(right, b_part, m)?;

    let mut out = Matrix::zeros(m);
    engine.multiply_into(lhs.view(), rhs.view(), out.view_mut())?;
    Ok(out)
}

/// Operand value from its quadrant blocks, stored back to back in the order
/// of [`Operand::quadrants`].
fn evaluate<T: Element>(op: Operand, blocks: &[T], m: usize) -> Result<Matrix<T>> {
    let block = m * m;
    if blocks.len() != op.quadrants().len() * block {
        return Err(dimension_mismatch(
            blocks.len(),
            op.quadrants().len() * block,
            "operand blocks",
        ));
    }
    match op {
        Operand::Quadrant(_) => Matrix::from_vec(m, blocks.to_vec()),
        Operand::Sum(..) | Operand::Difference(..) => {
            let (x, y) = blocks.split_at(block);
            let (x, y) = (MatView::square(x, m)?, MatView::square(y, m)?);
            let mut out = Matrix::zeros(m);
            if matches!(op, Operand::Sum(..)) {
                add_into(&x, &y, &mut out.view_mut());
            } else {
                sub_into(&x, &y, &mut out.view_mut());
            }
            Ok(out)
        }
    }
}

/// Runs [`hybrid_multiply`] on an in-process cluster of
/// `config.worker_count` ranks and returns the coordinator's result.
///
/// # Errors
///
/// A worker count other than seven is rejected before any rank starts.
pub fn run_hybrid_local<T: Element>(
    config: &StrassenConfig,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<Matrix<T>> {
    Topology::strassen().validate(config.worker_count)?;
    let cluster = LocalCluster::new(config.worker_count)?;
    let results = cluster.run::<T, _, _>(|comm| {
        hybrid_multiply(comm, config, comm.is_coordinator().then_some((a, b)))
    })?;
    results
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| communication_error(COORDINATOR, "coordinator produced no result"))
}
