//! Mapping of the top-level Strassen products onto ranks.
//!
//! Rank `r` computes product `M(r + 1)`: the coordinator keeps `M1`, and each
//! of the six workers receives exactly the quadrant blocks its product reads,
//! `A` blocks first, then `B` blocks, in operand order.

use crate::distributed::comm::COORDINATOR;
use crate::error::{configuration_error, Result};
use crate::matrix::Element;
use crate::strassen::products::Product;
use crate::view::{MatView, Quadrant};

/// What one rank computes and which blocks it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub rank: usize,
    pub product: Product,
    pub a_blocks: Vec<Quadrant>,
    pub b_blocks: Vec<Quadrant>,
}

impl Assignment {
    /// Number of `m x m` blocks this rank works from.
    pub fn block_count(&self) -> usize {
        self.a_blocks.len() + self.b_blocks.len()
    }
}

/// Fixed process topology for one level of distributed Strassen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    assignments: Vec<Assignment>,
}

impl Topology {
    /// One rank per Strassen product.
    pub fn strassen() -> Self {
        let assignments = Product::ALL
            .into_iter()
            .enumerate()
            .map(|(rank, product)| {
                let (left, right) = product.operands();
                Assignment {
                    rank,
                    product,
                    a_blocks: left.quadrants(),
                    b_blocks: right.quadrants(),
                }
            })
            .collect();
        Self { assignments }
    }

    /// Number of ranks this topology requires.
    pub fn world_size(&self) -> usize {
        self.assignments.len()
    }

    pub fn assignment(&self, rank: usize) -> Option<&Assignment> {
        self.assignments.get(rank)
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Rejects any world size other than [`Topology::world_size`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the required process count.
    pub fn validate(&self, world_size: usize) -> Result<()> {
        if world_size != self.world_size() {
            return Err(configuration_error(format!(
                "hybrid Strassen requires exactly {} processes, got {}",
                self.world_size(),
                world_size
            )));
        }
        Ok(())
    }

    /// Elements sent to each rank for quadrant side `m`. The coordinator
    /// keeps its own blocks and is sent nothing.
    pub fn send_counts(&self, m: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .map(|a| {
                if a.rank == COORDINATOR {
                    0
                } else {
                    a.block_count() * m * m
                }
            })
            .collect()
    }

    /// Exclusive prefix sum of `counts`.
    pub fn displacements(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .scan(0, |offset, &count| {
                let displ = *offset;
                *offset += count;
                Some(displ)
            })
            .collect()
    }

    /// Copies `rank`'s blocks of `a` and `b` into a dense buffer.
    pub fn pack_for<T: Element>(
        &self,
        rank: usize,
        a: &MatView<'_, T>,
        b: &MatView<'_, T>,
    ) -> Vec<T> {
        let Some(assignment) = self.assignment(rank) else {
            return Vec::new();
        };
        let m = a.n() / 2;
        let mut out = Vec::with_capacity(assignment.block_count() * m * m);
        for &q in &assignment.a_blocks {
            out.extend(a.quadrant(q).to_vec());
        }
        for &q in &assignment.b_blocks {
            out.extend(b.quadrant(q).to_vec());
        }
        out
    }

    /// Send buffer for a scatter: every worker's blocks in rank order, laid
    /// out to match [`Topology::send_counts`] and [`Topology::displacements`].
    pub fn pack<T: Element>(&self, a: &MatView<'_, T>, b: &MatView<'_, T>) -> Vec<T> {
        self.assignments
            .iter()
            .filter(|asg| asg.rank != COORDINATOR)
            .flat_map(|asg| self.pack_for(asg.rank, a, b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use Quadrant::*;

    #[test]
    fn test_assignments() {
        let topology = Topology::strassen();
        assert_eq!(topology.world_size(), 7);

        let m2 = topology.assignment(1).unwrap();
        assert_eq!(m2.product, Product::M2);
        assert_eq!(m2.a_blocks, vec![BottomLeft, BottomRight]);
        assert_eq!(m2.b_blocks, vec![TopLeft]);

        let m6 = topology.assignment(5).unwrap();
        assert_eq!(m6.a_blocks, vec![BottomLeft, TopLeft]);
        assert_eq!(m6.b_blocks, vec![TopLeft, TopRight]);

        assert_eq!(topology.assignment(0).unwrap().product, Product::M1);
        assert!(topology.assignment(7).is_none());
    }

    #[test]
    fn test_counts_and_displacements() {
        let topology = Topology::strassen();
        let counts = topology.send_counts(2);
        assert_eq!(counts, vec![0, 12, 12, 12, 12, 16, 16]);
        assert_eq!(
            Topology::displacements(&counts),
            vec![0, 0, 12, 24, 36, 48, 64]
        );
    }

    #[test]
    fn test_validate_world_size() {
        let topology = Topology::strassen();
        assert!(topology.validate(7).is_ok());
        for size in [1, 6, 8] {
            let err = topology.validate(size).unwrap_err();
            assert!(err.to_string().contains("exactly 7"));
        }
    }

    #[test]
    fn test_pack_layout() {
        let a = Matrix::from_fn(4, |i, j| (i * 4 + j) as f32);
        let b = Matrix::from_fn(4, |i, j| 100.0 + (i * 4 + j) as f32);
        let topology = Topology::strassen();

        let packed = topology.pack(&a.view(), &b.view());
        let counts = topology.send_counts(2);
        assert_eq!(packed.len(), counts.iter().sum::<usize>());

        // Rank 1 (M2): A21, A22, B11.
        assert_eq!(&packed[..12], &[8.0, 9.0, 12.0, 13.0, 10.0, 11.0, 14.0, 15.0, 100.0, 101.0, 104.0, 105.0]);
        assert_eq!(topology.pack_for(1, &a.view(), &b.view()), packed[..12].to_vec());
    }
}
