//! Strassen matrix multiplication.
//!
//! Two regimes share one set of product and combination tables:
//!
//! - [`parallel`]: the top `max_depth` levels fork their seven products
//!   through a [`TaskScheduler`] and join before combining.
//! - [`serial`]: deeper levels run one after another inside a single
//!   arena-backed [`Workspace`].
//!
//! The entry points pad operands to a multiple of the threshold, run the
//! recursion on views of the padded buffers, and crop the result.

pub mod products;
pub mod serial;

mod parallel;

use crate::config::StrassenConfig;
use crate::error::{configuration_error, dimension_mismatch, Result};
use crate::matrix::{Element, Matrix};
use crate::scheduler::{RayonScheduler, TaskScheduler};
use crate::utils::padded_size;
use crate::view::{MatView, MatViewMut};
use crate::workspace::Workspace;

/// Task-parallel Strassen engine bound to a scheduler.
///
/// # Examples
///
/// ```
/// use hybrid_strassen::{Matrix, Strassen, StrassenConfig};
///
/// let config = StrassenConfig::new().with_threshold(2).with_max_depth(1);
/// let engine = Strassen::new(config).unwrap();
/// let a = Matrix::<f64>::identity(5);
/// let b = Matrix::from_fn(5, |i, j| (i * 5 + j) as f64);
/// assert_eq!(engine.multiply(&a, &b).unwrap(), b);
/// ```
#[derive(Debug)]
pub struct Strassen<S = RayonScheduler> {
    config: StrassenConfig,
    scheduler: S,
}

impl Strassen<RayonScheduler> {
    /// Builds an engine with a dedicated Rayon pool of `config.threads` workers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or the pool
    /// cannot be built.
    pub fn new(config: StrassenConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = RayonScheduler::new(config.threads)?;
        Ok(Self { config, scheduler })
    }
}

impl<S: TaskScheduler> Strassen<S> {
    /// Builds an engine around an existing scheduler. `config.threads` is
    /// ignored; the scheduler already owns its threads.
    pub fn with_scheduler(config: StrassenConfig, scheduler: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, scheduler })
    }

    pub fn config(&self) -> &StrassenConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// `A * B`, padding to a multiple of the threshold when needed.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch before any work if the sides differ, or
    /// the first task failure.
    pub fn multiply<T: Element>(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
        with_padding(a, b, self.config.threshold, |a, b, c| {
            self.multiply_into(a, b, c)
        })
    }

    /// `C = A * B` over caller-provided views. No padding is applied; odd
    /// sides simply stop the recursion early.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch if the three views differ in side.
    pub fn multiply_into<T: Element>(
        &self,
        a: MatView<'_, T>,
        b: MatView<'_, T>,
        c: MatViewMut<'_, T>,
    ) -> Result<()> {
        check_sides(a.n(), b.n(), c.n())?;
        log::debug!(
            "strassen n = {} threshold = {} max_depth = {} on {} ({} threads)",
            a.n(),
            self.config.threshold,
            self.config.max_depth,
            self.scheduler.name(),
            self.scheduler.threads()
        );
        parallel::multiply(a, b, c, 0, &self.config, &self.scheduler)
    }
}

/// Single-threaded Strassen engine that keeps its arena between calls.
#[derive(Debug)]
pub struct SerialStrassen<T> {
    threshold: usize,
    workspace: Workspace<T>,
}

impl<T: Element> SerialStrassen<T> {
    /// # Errors
    ///
    /// Returns a configuration error for a zero threshold.
    pub fn new(threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(configuration_error("threshold must be at least 1"));
        }
        Ok(Self {
            threshold,
            workspace: Workspace::new(0, threshold),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Current arena size in elements.
    pub fn workspace_len(&self) -> usize {
        self.workspace.len()
    }

    /// `A * B`, padding to a multiple of the threshold when needed.
    pub fn multiply(&mut self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
        let threshold = self.threshold;
        with_padding(a, b, threshold, |a, b, c| self.multiply_into(a, b, c))
    }

    /// `C = A * B` over caller-provided views, growing the arena if needed.
    pub fn multiply_into(
        &mut self,
        a: MatView<'_, T>,
        b: MatView<'_, T>,
        c: MatViewMut<'_, T>,
    ) -> Result<()> {
        check_sides(a.n(), b.n(), c.n())?;
        self.workspace.reserve(a.n(), self.threshold);
        serial::multiply(a, b, c, self.workspace.cursor(), self.threshold)
    }
}

fn check_sides(a: usize, b: usize, c: usize) -> Result<()> {
    if a != b {
        return Err(dimension_mismatch(a, b, "operands must have the same side"));
    }
    if a != c {
        return Err(dimension_mismatch(a, c, "output must match the operand side"));
    }
    Ok(())
}

/// Runs `f` on operands padded to a multiple of `threshold` and crops the
/// product back to the original side.
pub(crate) fn with_padding<T, F>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    threshold: usize,
    f: F,
) -> Result<Matrix<T>>
where
    T: Element,
    F: FnOnce(MatView<'_, T>, MatView<'_, T>, MatViewMut<'_, T>) -> Result<()>,
{
    let n = a.n();
    if n != b.n() {
        return Err(dimension_mismatch(n, b.n(), "operands must have the same side"));
    }
    if threshold == 0 {
        return Err(configuration_error("threshold must be at least 1"));
    }

    let padded = padded_size(n, threshold);
    if padded == n {
        let mut c = Matrix::zeros(n);
        f(a.view(), b.view(), c.view_mut())?;
        return Ok(c);
    }

    log::debug!("padding {n} to {padded} (threshold {threshold})");
    let (pa, pb) = (a.padded(padded), b.padded(padded));
    let mut pc = Matrix::zeros(padded);
    f(pa.view(), pb.view(), pc.view_mut())?;
    Ok(pc.cropped(n))
}
