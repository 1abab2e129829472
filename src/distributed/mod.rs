//! Message-passing variants.
//!
//! Algorithms here are written against [`Communicator`] and run on every rank
//! of a group; the coordinator (rank 0) owns the operands and the result.
//! [`LocalCluster`] provides a group of isolated in-process ranks.

pub mod comm;
pub mod hybrid;
pub mod row_block;
pub mod topology;

pub use comm::{ChannelCommunicator, Communicator, LocalCluster, Message, COORDINATOR};
pub use hybrid::{hybrid_multiply, hybrid_padded_size, run_hybrid_local};
pub use row_block::{row_block_multiply, run_row_block_local, RowBlockOutcome};
pub use topology::{Assignment, Topology};
