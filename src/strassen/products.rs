//! The seven Strassen products and the combination step, as data.
//!
//! ```text
//! M1 = (A11 + A22)(B11 + B22)    C11 = M1 + M4 - M5 + M7
//! M2 = (A21 + A22) B11           C12 = M3 + M5
//! M3 = A11 (B12 - B22)           C21 = M2 + M4
//! M4 = A22 (B21 - B11)           C22 = M1 - M2 + M3 + M6
//! M5 = (A11 + A12) B22
//! M6 = (A21 - A11)(B11 + B12)
//! M7 = (A12 - A22)(B21 + B22)
//! ```
//!
//! The serial engine, the task-parallel engine and the distribution layer all
//! read these tables, so every path performs the same arithmetic in the same
//! order.

use crate::kernel::{add_into, sub_into};
use crate::matrix::Element;
use crate::view::{MatView, MatViewMut, Quadrant};

use Quadrant::{BottomLeft as Q21, BottomRight as Q22, TopLeft as Q11, TopRight as Q12};

/// One factor of a product: a quadrant as-is, or a sum/difference of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Quadrant(Quadrant),
    Sum(Quadrant, Quadrant),
    Difference(Quadrant, Quadrant),
}

impl Operand {
    /// Quadrants this operand reads, in the order they are shipped to a worker.
    pub fn quadrants(self) -> Vec<Quadrant> {
        match self {
            Operand::Quadrant(q) => vec![q],
            Operand::Sum(x, y) | Operand::Difference(x, y) => vec![x, y],
        }
    }

    /// Whether this operand has to be materialized into a temporary.
    pub fn needs_temporary(self) -> bool {
        !matches!(self, Operand::Quadrant(_))
    }

    /// Evaluates a sum/difference operand into `out`.
    ///
    /// `blocks` yields the `m x m` view for each quadrant of the parent.
    ///
    /// # Panics
    ///
    /// Panics when called on a plain quadrant operand.
    pub fn materialize<'a, T: Element>(
        self,
        blocks: impl Fn(Quadrant) -> MatView<'a, T>,
        out: &mut MatViewMut<'_, T>,
    ) {
        match self {
            Operand::Sum(x, y) => add_into(&blocks(x), &blocks(y), out),
            Operand::Difference(x, y) => sub_into(&blocks(x), &blocks(y), out),
            Operand::Quadrant(_) => panic!("plain quadrant operands are used in place"),
        }
    }
}

/// The seven Strassen products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M7,
}

impl Product {
    pub const ALL: [Product; 7] = [
        Product::M1,
        Product::M2,
        Product::M3,
        Product::M4,
        Product::M5,
        Product::M6,
        Product::M7,
    ];

    /// Zero-based position (`M1` is 0).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Left (`A`) and right (`B`) operand of this product.
    pub fn operands(self) -> (Operand, Operand) {
        use Operand::{Difference, Quadrant as Q, Sum};
        match self {
            Product::M1 => (Sum(Q11, Q22), Sum(Q11, Q22)),
            Product::M2 => (Sum(Q21, Q22), Q(Q11)),
            Product::M3 => (Q(Q11), Difference(Q12, Q22)),
            Product::M4 => (Q(Q22), Difference(Q21, Q11)),
            Product::M5 => (Sum(Q11, Q12), Q(Q22)),
            Product::M6 => (Difference(Q21, Q11), Sum(Q11, Q12)),
            Product::M7 => (Difference(Q12, Q22), Sum(Q21, Q22)),
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M{}", self.index() + 1)
    }
}

/// Sign of one term in a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// Terms of each output quadrant, evaluated left to right.
pub fn combination(q: Quadrant) -> &'static [(Sign, Product)] {
    use Product::*;
    use Sign::*;
    match q {
        Q11 => &[(Plus, M1), (Plus, M4), (Minus, M5), (Plus, M7)],
        Q12 => &[(Plus, M3), (Plus, M5)],
        Q21 => &[(Plus, M2), (Plus, M4)],
        Q22 => &[(Plus, M1), (Minus, M2), (Plus, M3), (Plus, M6)],
    }
}

/// Writes the four quadrants of `c` from the dense `m x m` products.
///
/// Overwrites `c`; `products[i]` holds `M(i+1)` in row-major order.
pub fn combine<T: Element>(products: [&[T]; 7], c: &mut MatViewMut<'_, T>) {
    let m = c.n() / 2;
    debug_assert!(products.iter().all(|p| p.len() == m * m));

    for (q, mut out) in Quadrant::ALL.into_iter().zip(c.quadrants_mut()) {
        let terms = combination(q);
        for i in 0..m {
            let row = out.row_mut(i);
            let (first_sign, first) = terms[0];
            debug_assert_eq!(first_sign, Sign::Plus);
            row.copy_from_slice(&products[first.index()][i * m..(i + 1) * m]);
            for &(sign, p) in &terms[1..] {
                let src = &products[p.index()][i * m..(i + 1) * m];
                match sign {
                    Sign::Plus => row.iter_mut().zip(src).for_each(|(o, &x)| *o = *o + x),
                    Sign::Minus => row.iter_mut().zip(src).for_each(|(o, &x)| *o = *o - x),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    #[test]
    fn test_operand_block_counts() {
        let counts: Vec<usize> = Product::ALL
            .iter()
            .map(|p| {
                let (l, r) = p.operands();
                l.quadrants().len() + r.quadrants().len()
            })
            .collect();
        assert_eq!(counts, vec![4, 3, 3, 3, 3, 4, 4]);
    }

    #[test]
    fn test_materialize_difference() {
        let a = Matrix::from_fn(4, |i, j| (i * 4 + j) as f32);
        let view = a.view();
        let mut out = Matrix::zeros(2);
        Operand::Difference(Q21, Q11).materialize(|q| view.quadrant(q), &mut out.view_mut());
        assert_eq!(out.as_slice(), &[8.0, 8.0, 8.0, 8.0]);
    }

    #[test]
    fn test_combine_recovers_block_product() {
        // With A = I the products reduce so that C must equal B.
        let n = 4;
        let a = Matrix::<f64>::identity(n);
        let b = Matrix::from_fn(n, |i, j| (i * n + j) as f64);
        let (av, bv) = (a.view(), b.view());
        let m = n / 2;

        let mut products: Vec<Vec<f64>> = Vec::new();
        for p in Product::ALL {
            let (l, r) = p.operands();
            let mut lt = Matrix::zeros(m);
            let mut rt = Matrix::zeros(m);
            let lv = match l {
                Operand::Quadrant(q) => av.quadrant(q).to_vec(),
                _ => {
                    l.materialize(|q| av.quadrant(q), &mut lt.view_mut());
                    lt.as_slice().to_vec()
                }
            };
            let rv = match r {
                Operand::Quadrant(q) => bv.quadrant(q).to_vec(),
                _ => {
                    r.materialize(|q| bv.quadrant(q), &mut rt.view_mut());
                    rt.as_slice().to_vec()
                }
            };
            let lm = Matrix::from_vec(m, lv).unwrap();
            let rm = Matrix::from_vec(m, rv).unwrap();
            let mut out = Matrix::zeros(m);
            crate::kernel::multiply_accumulate(&lm.view(), &rm.view(), &mut out.view_mut());
            products.push(out.into_vec());
        }

        let mut c = Matrix::zeros(n);
        let refs: [&[f64]; 7] = std::array::from_fn(|i| products[i].as_slice());
        combine(refs, &mut c.view_mut());
        assert_eq!(c, b);
    }

    #[test]
    fn test_product_display() {
        assert_eq!(Product::M1.to_string(), "M1");
        assert_eq!(Product::M7.to_string(), "M7");
    }
}
