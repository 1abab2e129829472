//! Parallel and distributed dense matrix multiplication around a
//! depth-limited, task-parallel Strassen recursion.
//!
//! - [`Strassen`] / [`SerialStrassen`]: shared-memory Strassen engines.
//! - [`divide_conquer`]: eight-product recursive multiply.
//! - [`tiled`]: row-band tiled multiply on a Rayon pool.
//! - [`distributed`]: hybrid Strassen and row-block multiply over a
//!   message-passing [`distributed::Communicator`].

pub mod config;
pub mod distributed;
pub mod divide_conquer;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod scheduler;
pub mod strassen;
pub mod tiled;
pub mod utils;
pub mod view;
pub mod workspace;

pub use config::StrassenConfig;
pub use error::{Result, StrassenError};
pub use matrix::{Element, Matrix};
pub use scheduler::{RayonScheduler, SequentialScheduler, TaskScheduler};
pub use strassen::{SerialStrassen, Strassen};
pub use view::{MatView, MatViewMut, Quadrant};

/// Base-case cutoff: sides at or below this use the kernel.
pub const DEFAULT_THRESHOLD: usize = 128;
/// Recursion levels that fork tasks before switching to the serial engine.
pub const DEFAULT_MAX_DEPTH: usize = 4;
/// Independent products per Strassen level.
pub const STRASSEN_FAN_OUT: usize = 7;

/// Kernel blocking along `k`.
pub const KC: usize = 256;
/// Kernel blocking along `j`.
pub const NC: usize = 512;
