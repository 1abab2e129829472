//! Blocking message passing between ranks.
//!
//! [`Communicator`] is the process-group interface the distributed algorithms
//! are written against: point-to-point `send`/`recv` plus the collectives they
//! need, built on top of them. [`LocalCluster`] runs a group of ranks as
//! isolated OS threads connected only by channels, one per ordered pair.

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{communication_error, configuration_error, dimension_mismatch, Result, StrassenError};
use crate::matrix::Element;

/// Rank that owns the operands and assembles the result.
pub const COORDINATOR: usize = 0;

/// Payload exchanged between ranks.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<T> {
    /// Integer metadata: sizes, counts, displacements.
    Table(Vec<usize>),
    /// Matrix elements.
    Block(Vec<T>),
    /// Seconds spent by the sender.
    Elapsed(f64),
}

impl<T> Message<T> {
    fn kind(&self) -> &'static str {
        match self {
            Message::Table(_) => "table",
            Message::Block(_) => "block",
            Message::Elapsed(_) => "elapsed",
        }
    }

    /// Unwraps a table, or fails with a communication error attributed to `rank`.
    pub fn into_table(self, rank: usize) -> Result<Vec<usize>> {
        match self {
            Message::Table(table) => Ok(table),
            other => Err(unexpected(rank, "table", other.kind())),
        }
    }

    pub fn into_block(self, rank: usize) -> Result<Vec<T>> {
        match self {
            Message::Block(block) => Ok(block),
            other => Err(unexpected(rank, "block", other.kind())),
        }
    }

    pub fn into_elapsed(self, rank: usize) -> Result<f64> {
        match self {
            Message::Elapsed(seconds) => Ok(seconds),
            other => Err(unexpected(rank, "elapsed", other.kind())),
        }
    }
}

fn unexpected(rank: usize, expected: &str, got: &str) -> StrassenError {
    communication_error(rank, format!("expected a {expected} message, received a {got}"))
}

/// A fixed group of ranks that exchange [`Message`]s.
///
/// All operations block. Collectives must be entered by every rank of the
/// group in the same order with the same `root`.
pub trait Communicator<T: Element> {
    /// This process's rank in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    fn send(&self, to: usize, message: Message<T>) -> Result<()>;

    fn recv(&self, from: usize) -> Result<Message<T>>;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Sends the root's `message` to every rank; every rank returns it.
    ///
    /// # Errors
    ///
    /// Fails on the root if it has no message, and on any rank whose peer
    /// disconnected.
    fn broadcast(&self, root: usize, message: Option<Message<T>>) -> Result<Message<T>> {
        if self.rank() != root {
            return self.recv(root);
        }
        let message = message
            .ok_or_else(|| communication_error(root, "broadcast root has no message"))?;
        for peer in (0..self.size()).filter(|&r| r != root) {
            self.send(peer, message.clone())?;
        }
        Ok(message)
    }

    /// Sends `counts[r]` elements starting at `displs[r]` of the root's buffer
    /// to rank `r`; every rank returns its own share.
    fn scatterv(
        &self,
        root: usize,
        send: Option<(&[T], &[usize], &[usize])>,
    ) -> Result<Vec<T>> {
        if self.rank() != root {
            return self.recv(root)?.into_block(self.rank());
        }
        let (buffer, counts, displs) =
            send.ok_or_else(|| communication_error(root, "scatter root has no buffer"))?;
        if counts.len() != self.size() || displs.len() != self.size() {
            return Err(dimension_mismatch(
                counts.len().min(displs.len()),
                self.size(),
                "scatter tables must have one entry per rank",
            ));
        }

        let mut own = Vec::new();
        for (peer, (&count, &displ)) in counts.iter().zip(displs).enumerate() {
            let end = displ + count;
            if end > buffer.len() {
                return Err(dimension_mismatch(end, buffer.len(), "scatter range past the send buffer"));
            }
            let share = buffer[displ..end].to_vec();
            if peer == root {
                own = share;
            } else {
                self.send(peer, Message::Block(share))?;
            }
        }
        Ok(own)
    }

    /// Collects one block per rank on the root, in rank order.
    ///
    /// Returns `Some` on the root and `None` elsewhere.
    fn gather(&self, root: usize, local: Vec<T>) -> Result<Option<Vec<Vec<T>>>> {
        if self.rank() != root {
            self.send(root, Message::Block(local))?;
            return Ok(None);
        }
        let mut local = Some(local);
        let mut blocks = Vec::with_capacity(self.size());
        for peer in 0..self.size() {
            if peer == root {
                blocks.push(local.take().unwrap_or_default());
            } else {
                blocks.push(self.recv(peer)?.into_block(root)?);
            }
        }
        Ok(Some(blocks))
    }

    /// Maximum of every rank's `value`, returned on the root only.
    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>> {
        if self.rank() != root {
            self.send(root, Message::Elapsed(value))?;
            return Ok(None);
        }
        let mut max = value;
        for peer in (0..self.size()).filter(|&r| r != root) {
            max = max.max(self.recv(peer)?.into_elapsed(root)?);
        }
        Ok(Some(max))
    }
}

/// One rank's endpoint inside a [`LocalCluster`].
#[derive(Debug)]
pub struct ChannelCommunicator<T> {
    rank: usize,
    size: usize,
    outgoing: Vec<Sender<Message<T>>>,
    incoming: Vec<Receiver<Message<T>>>,
}

impl<T: Element> Communicator<T> for ChannelCommunicator<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, to: usize, message: Message<T>) -> Result<()> {
        let channel = self
            .outgoing
            .get(to)
            .ok_or_else(|| communication_error(self.rank, format!("no rank {to} in a group of {}", self.size)))?;
        channel
            .send(message)
            .map_err(|_| communication_error(self.rank, format!("rank {to} has gone away")))
    }

    fn recv(&self, from: usize) -> Result<Message<T>> {
        let channel = self
            .incoming
            .get(from)
            .ok_or_else(|| communication_error(self.rank, format!("no rank {from} in a group of {}", self.size)))?;
        channel
            .recv()
            .map_err(|_| communication_error(self.rank, format!("rank {from} disconnected")))
    }
}

/// Runs a group of ranks as threads in this process.
///
/// Ranks share no memory: everything they exchange goes through channels.
/// A rank that returns (normally or with an error) drops its endpoints, so a
/// peer blocked on it fails with a communication error instead of hanging.
#[derive(Debug, Clone, Copy)]
pub struct LocalCluster {
    size: usize,
}

impl LocalCluster {
    /// # Errors
    ///
    /// Returns a configuration error for an empty group.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(configuration_error("a cluster needs at least one rank"));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Builds one communicator per rank.
    pub fn endpoints<T: Element>(&self) -> Vec<ChannelCommunicator<T>> {
        let size = self.size;
        // channels[from][to]
        let mut senders: Vec<Vec<Sender<Message<T>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Message<T>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for from in 0..size {
            let mut row = Vec::with_capacity(size);
            for slots in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                row.push(tx);
                slots[from] = Some(rx);
            }
            senders.push(row);
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| ChannelCommunicator {
                rank,
                size,
                outgoing,
                incoming: incoming.into_iter().flatten().collect(),
            })
            .collect()
    }

    /// Runs `body` on every rank concurrently and returns the per-rank
    /// results in rank order.
    ///
    /// # Errors
    ///
    /// If any rank fails, returns the root-cause error: a non-communication
    /// error if one exists (peers of a failed rank only see disconnects),
    /// otherwise the lowest rank's error. A panicking rank is a task error.
    pub fn run<T, R, F>(&self, body: F) -> Result<Vec<R>>
    where
        T: Element,
        R: Send,
        F: Fn(&ChannelCommunicator<T>) -> Result<R> + Sync,
    {
        let body = &body;
        let outcomes: Vec<Result<R>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.size);
            for comm in self.endpoints::<T>() {
                let rank = comm.rank;
                let spawned = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || body(&comm));
                handles.push(spawned.map_err(|e| {
                    communication_error(rank, format!("failed to start rank: {e}"))
                }));
            }
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        Err(crate::error::task_error(format!("rank {rank} panicked")))
                    }),
                    Err(e) => Err(e),
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error: Option<StrassenError> = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    let replace = match &first_error {
                        None => true,
                        Some(StrassenError::Communication { .. }) => {
                            !matches!(e, StrassenError::Communication { .. })
                        }
                        Some(_) => false,
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}
