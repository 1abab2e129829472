//! Zero-copy square views into row-major buffers.
//!
//! A view is `(buffer, n, ld, row offset, col offset)`: element `(i, j)` of the
//! view lives at `(row_offset + i) * ld + col_offset + j` in the buffer. The
//! extent is checked once when a view is built; quadrant splitting only ever
//! produces children inside the parent's extent, so no further bounds checks
//! are needed on the hot paths.
//!
//! [`MatView`] borrows the buffer immutably and is `Copy`. [`MatViewMut`]
//! holds an exclusive claim on its own index set only, which is what lets the
//! four quadrants of one output block be written from four threads at once.

use std::marker::PhantomData;

use crate::error::{dimension_mismatch, Result};

/// One of the four `m x m` blocks of an `n x n` view (`n = 2m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    /// All quadrants in row-major order (11, 12, 21, 22).
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    /// Row and column offsets of this quadrant for split point `m`.
    #[inline(always)]
    pub fn offsets(self, m: usize) -> (usize, usize) {
        match self {
            Quadrant::TopLeft => (0, 0),
            Quadrant::TopRight => (0, m),
            Quadrant::BottomLeft => (m, 0),
            Quadrant::BottomRight => (m, m),
        }
    }

    /// Position in [`Quadrant::ALL`].
    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Quadrant::TopLeft => 0,
            Quadrant::TopRight => 1,
            Quadrant::BottomLeft => 2,
            Quadrant::BottomRight => 3,
        }
    }
}

fn check_extent(
    len: usize,
    n: usize,
    ld: usize,
    row_offset: usize,
    col_offset: usize,
) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    if col_offset + n > ld {
        return Err(dimension_mismatch(
            col_offset + n,
            ld,
            "view columns exceed the leading dimension",
        ));
    }
    let last = (row_offset + n - 1) * ld + col_offset + n;
    if last > len {
        return Err(dimension_mismatch(
            last,
            len,
            "view extends past the end of its buffer",
        ));
    }
    Ok(())
}

/// Read-only square view.
#[derive(Debug, Clone, Copy)]
pub struct MatView<'a, T> {
    data: &'a [T],
    n: usize,
    ld: usize,
    row_offset: usize,
    col_offset: usize,
}

impl<'a, T> MatView<'a, T> {
    /// Creates a view of side `n` with leading dimension `ld` at the given offsets.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch if the view does not fit in `data`.
    pub fn new(
        data: &'a [T],
        n: usize,
        ld: usize,
        row_offset: usize,
        col_offset: usize,
    ) -> Result<Self> {
        check_extent(data.len(), n, ld, row_offset, col_offset)?;
        Ok(Self {
            data,
            n,
            ld,
            row_offset,
            col_offset,
        })
    }

    /// Views a dense `n x n` buffer.
    pub fn square(data: &'a [T], n: usize) -> Result<Self> {
        if data.len() != n * n {
            return Err(dimension_mismatch(
                data.len(),
                n * n,
                "dense buffer length must equal n * n",
            ));
        }
        Self::new(data, n, n, 0, 0)
    }

    #[inline(always)]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline(always)]
    pub fn ld(&self) -> usize {
        self.ld
    }

    /// Row and column offset of the view origin inside the buffer.
    #[inline(always)]
    pub fn offset(&self) -> (usize, usize) {
        (self.row_offset, self.col_offset)
    }

    /// Row `i` of the view as a contiguous slice of length `n`.
    #[inline(always)]
    pub fn row(&self, i: usize) -> &'a [T] {
        assert!(i < self.n, "row {} out of range for view of side {}", i, self.n);
        let start = (self.row_offset + i) * self.ld + self.col_offset;
        &self.data[start..start + self.n]
    }

    /// Child view of one quadrant. Splitting an odd-sided view is a caller bug.
    #[inline]
    pub fn quadrant(&self, q: Quadrant) -> MatView<'a, T> {
        assert!(
            self.n % 2 == 0,
            "cannot quarter a view of odd side {}",
            self.n
        );
        let m = self.n / 2;
        let (dr, dc) = q.offsets(m);
        MatView {
            data: self.data,
            n: m,
            ld: self.ld,
            row_offset: self.row_offset + dr,
            col_offset: self.col_offset + dc,
        }
    }

    /// All four quadrants in row-major order.
    pub fn quadrants(&self) -> [MatView<'a, T>; 4] {
        Quadrant::ALL.map(|q| self.quadrant(q))
    }
}

impl<T: Copy> MatView<'_, T> {
    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row(i)[j]
    }

    /// Copies the view into a dense row-major `Vec` of `n * n` elements.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.n * self.n);
        for i in 0..self.n {
            out.extend_from_slice(self.row(i));
        }
        out
    }
}

/// Mutable square view with exclusive access to its own index set.
pub struct MatViewMut<'a, T> {
    ptr: *mut T,
    len: usize,
    n: usize,
    ld: usize,
    row_offset: usize,
    col_offset: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: a `MatViewMut` only ever touches the elements inside its own extent,
// and the only way to obtain two views over one buffer is quadrant splitting,
// which yields pairwise-disjoint index sets.
unsafe impl<T: Send> Send for MatViewMut<'_, T> {}

impl<T> std::fmt::Debug for MatViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatViewMut")
            .field("n", &self.n)
            .field("ld", &self.ld)
            .field("row_offset", &self.row_offset)
            .field("col_offset", &self.col_offset)
            .finish()
    }
}

impl<'a, T> MatViewMut<'a, T> {
    /// Creates a mutable view of side `n` with leading dimension `ld` at the given offsets.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch if the view does not fit in `data`.
    pub fn new(
        data: &'a mut [T],
        n: usize,
        ld: usize,
        row_offset: usize,
        col_offset: usize,
    ) -> Result<Self> {
        check_extent(data.len(), n, ld, row_offset, col_offset)?;
        Ok(Self {
            ptr: data.as_mut_ptr(),
            len: data.len(),
            n,
            ld,
            row_offset,
            col_offset,
            _marker: PhantomData,
        })
    }

    /// Views a dense `n x n` buffer.
    pub fn square(data: &'a mut [T], n: usize) -> Result<Self> {
        if data.len() != n * n {
            return Err(dimension_mismatch(
                data.len(),
                n * n,
                "dense buffer length must equal n * n",
            ));
        }
        Self::new(data, n, n, 0, 0)
    }

    #[inline(always)]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline(always)]
    pub fn ld(&self) -> usize {
        self.ld
    }

    #[inline(always)]
    pub fn offset(&self) -> (usize, usize) {
        (self.row_offset, self.col_offset)
    }

    /// Row `i` of the view as a contiguous mutable slice of length `n`.
    #[inline(always)]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        assert!(i < self.n, "row {} out of range for view of side {}", i, self.n);
        let start = (self.row_offset + i) * self.ld + self.col_offset;
        debug_assert!(start + self.n <= self.len);
        // SAFETY: `start..start + n` lies inside the extent checked at
        // construction, and this view holds the only claim on those elements.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(start), self.n) }
    }

    /// Row `i` of the view as a shared slice.
    #[inline(always)]
    pub fn row(&self, i: usize) -> &[T] {
        assert!(i < self.n, "row {} out of range for view of side {}", i, self.n);
        let start = (self.row_offset + i) * self.ld + self.col_offset;
        // SAFETY: see `row_mut`; the shared borrow of `self` prevents writes
        // through this view while the slice is alive.
        unsafe { std::slice::from_raw_parts(self.ptr.add(start), self.n) }
    }

    fn child(&self, q: Quadrant) -> (usize, usize, usize) {
        assert!(
            self.n % 2 == 0,
            "cannot quarter a view of odd side {}",
            self.n
        );
        let m = self.n / 2;
        let (dr, dc) = q.offsets(m);
        (m, self.row_offset + dr, self.col_offset + dc)
    }

    /// Splits the view into its four quadrants, consuming it.
    pub fn into_quadrants(self) -> [MatViewMut<'a, T>; 4] {
        Quadrant::ALL.map(|q| {
            let (m, row_offset, col_offset) = self.child(q);
            MatViewMut {
                ptr: self.ptr,
                len: self.len,
                n: m,
                ld: self.ld,
                row_offset,
                col_offset,
                _marker: PhantomData,
            }
        })
    }

    /// Borrows the four quadrants for as long as `self` is borrowed.
    pub fn quadrants_mut(&mut self) -> [MatViewMut<'_, T>; 4] {
        Quadrant::ALL.map(|q| {
            let (m, row_offset, col_offset) = self.child(q);
            MatViewMut {
                ptr: self.ptr,
                len: self.len,
                n: m,
                ld: self.ld,
                row_offset,
                col_offset,
                _marker: PhantomData,
            }
        })
    }

    /// Short-lived reborrow of the whole view.
    pub fn reborrow(&mut self) -> MatViewMut<'_, T> {
        MatViewMut {
            ptr: self.ptr,
            len: self.len,
            n: self.n,
            ld: self.ld,
            row_offset: self.row_offset,
            col_offset: self.col_offset,
            _marker: PhantomData,
        }
    }
}

impl<T: Copy> MatViewMut<'_, T> {
    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row(i)[j]
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.row_mut(i)[j] = value;
    }

    /// Overwrites every element of the view with `value`.
    pub fn fill(&mut self, value: T) {
        for i in 0..self.n {
            self.row_mut(i).fill(value);
        }
    }

    /// Copies a same-sided view into this one.
    pub fn copy_from(&mut self, src: &MatView<'_, T>) {
        assert_eq!(self.n, src.n(), "copy_from requires equal sides");
        for i in 0..self.n {
            self.row_mut(i).copy_from_slice(src.row(i));
        }
    }
}
