//! Scratch arena for the serial Strassen recursion.
//!
//! One level of the recursion on side `n` needs nine `m x m` blocks
//! (`m = n / 2`): the seven products `M1..M7` and two operand temporaries.
//! The arena stores those levels back to back. A level takes its nine blocks
//! from the front of the cursor it was handed and passes the remainder down,
//! so a descendant can never alias an ancestor's blocks.
//!
//! The arena is reused across sequential calls. The task-parallel engine never
//! shares one between concurrent tasks; each task sizes its own.

use crate::error::{workspace_error, Result};
use crate::matrix::Element;

/// Number of `m x m` blocks one recursion level occupies.
pub const BLOCKS_PER_LEVEL: usize = 9;

/// Whether a call on side `n` decomposes rather than falling to the kernel.
#[inline(always)]
pub fn decomposes(n: usize, threshold: usize) -> bool {
    n > threshold && n % 2 == 0
}

/// Total scratch elements needed to expand side `n` down to `threshold`.
///
/// Sums `9 * (n / 2)^2` over every level that decomposes.
pub fn size_for(n: usize, threshold: usize) -> usize {
    let mut total = 0;
    let mut side = n;
    while decomposes(side, threshold) {
        let m = side / 2;
        total += BLOCKS_PER_LEVEL * m * m;
        side = m;
    }
    total
}

/// Owned scratch arena.
#[derive(Debug, Clone, Default)]
pub struct Workspace<T> {
    buffer: Vec<T>,
}

impl<T: Element> Workspace<T> {
    /// Arena sized for a full expansion of side `n` down to `threshold`.
    pub fn new(n: usize, threshold: usize) -> Self {
        Self {
            buffer: vec![T::zero(); size_for(n, threshold)],
        }
    }

    /// Grows the arena if a call on side `n` would not fit. Never shrinks.
    pub fn reserve(&mut self, n: usize, threshold: usize) {
        let needed = size_for(n, threshold);
        if needed > self.buffer.len() {
            log::debug!(
                "growing workspace from {} to {} elements (n = {}, threshold = {})",
                self.buffer.len(),
                needed,
                n,
                threshold
            );
            self.buffer.resize(needed, T::zero());
        }
    }

    /// Zeroes the arena between unrelated calls.
    pub fn reset(&mut self) {
        self.buffer.fill(T::zero());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Cursor positioned at the start of the arena (recursion level 0).
    pub fn cursor(&mut self) -> ArenaCursor<'_, T> {
        ArenaCursor {
            rest: &mut self.buffer,
            level: 0,
        }
    }
}

/// The part of an arena not yet claimed by ancestor levels.
#[derive(Debug)]
pub struct ArenaCursor<'a, T> {
    rest: &'a mut [T],
    level: usize,
}

/// The nine blocks of one recursion level.
#[derive(Debug)]
pub struct LevelBlocks<'a, T> {
    /// `M1..M7`, each `m * m` elements.
    pub products: [&'a mut [T]; 7],
    pub t1: &'a mut [T],
    pub t2: &'a mut [T],
}

impl<'a, T> ArenaCursor<'a, T> {
    /// Recursion level this cursor serves (0 at the top).
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Claims the nine `m x m` blocks for the current level and returns a
    /// cursor past them for the next level.
    ///
    /// # Errors
    ///
    /// Returns a workspace error if fewer than `9 * m * m` elements remain.
    pub fn take_level(self, m: usize) -> Result<(LevelBlocks<'a, T>, ArenaCursor<'a, T>)> {
        let block = m * m;
        let needed = BLOCKS_PER_LEVEL * block;
        if needed > self.rest.len() {
            return Err(workspace_error(needed, self.rest.len()));
        }
        let (current, rest) = self.rest.split_at_mut(needed);
        let (products, temps) = current.split_at_mut(7 * block);
        let (t1, t2) = temps.split_at_mut(block);

        let mut chunks = products.chunks_exact_mut(block.max(1));
        let products = std::array::from_fn(|_| chunks.next().unwrap_or_default());

        Ok((
            LevelBlocks { products, t1, t2 },
            ArenaCursor {
                rest,
                level: self.level + 1,
            },
        ))
    }

    /// Short-lived cursor over the same region, for sibling calls that run one
    /// after another.
    pub fn reborrow(&mut self) -> ArenaCursor<'_, T> {
        ArenaCursor {
            rest: &mut *self.rest,
            level: self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_for_closed_form() {
        // 256 -> 128 -> 64 with threshold 64: two levels (m = 128, 64).
        assert_eq!(size_for(256, 64), 9 * 128 * 128 + 9 * 64 * 64);
        assert_eq!(size_for(256, 128), 9 * 128 * 128);
        assert_eq!(size_for(128, 128), 0);
        assert_eq!(size_for(64, 128), 0);
    }

    #[test]
    fn test_size_for_stops_at_odd_sides() {
        // 24 -> 12 -> 6 -> 3 (odd, stops) with threshold 1.
        assert_eq!(size_for(24, 1), 9 * (144 + 36 + 9));
        assert_eq!(size_for(7, 1), 0);
    }

    #[test]
    fn test_levels_do_not_overlap() {
        let mut ws = Workspace::<f32>::new(16, 4);
        assert_eq!(ws.len(), 9 * 64 + 9 * 16);

        let cursor = ws.cursor();
        let (top, next) = cursor.take_level(8).unwrap();
        assert_eq!(next.level(), 1);
        assert_eq!(next.remaining(), 9 * 16);
        let (inner, last) = next.take_level(4).unwrap();
        assert_eq!(last.remaining(), 0);

        for p in top.products {
            assert_eq!(p.len(), 64);
            p.fill(1.0);
        }
        top.t1.fill(2.0);
        top.t2.fill(3.0);
        for p in inner.products {
            assert_eq!(p.len(), 16);
            assert!(p.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_take_level_is_size_checked() {
        let mut ws = Workspace::<f64>::new(8, 4);
        let err = ws.cursor().take_level(8).unwrap_err();
        assert_eq!(err, workspace_error(9 * 64, 9 * 16));
    }

    #[test]
    fn test_reserve_grows_and_reset_zeroes() {
        let mut ws = Workspace::<f32>::new(8, 8);
        assert!(ws.is_empty());
        ws.reserve(32, 8);
        assert_eq!(ws.len(), size_for(32, 8));

        let (blocks, _) = ws.cursor().take_level(16).unwrap();
        blocks.t1.fill(5.0);
        ws.reset();
        assert!(ws.cursor().take_level(16).unwrap().0.t1.iter().all(|&x| x == 0.0));

        ws.reserve(16, 8);
        assert_eq!(ws.len(), size_for(32, 8));
    }
}
