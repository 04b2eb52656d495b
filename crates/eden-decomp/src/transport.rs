//! Message transport abstraction (SPEC_FULL §4.5 supplement).
//!
//! The recv-list discovery protocol and the per-step wire format (§4.5.1) are
//! expressed against this trait rather than directly against an MPI binding,
//! so they can be exercised deterministically in tests via [`LoopbackTransport`].
//! A real MPI-backed transport is a feature-gated extension point left for a
//! deployment that links an MPI implementation; this crate does not provide
//! one; the design notes are explicit that reimplementers must not substitute
//! an all-to-all collective for the sparse any-source discovery this trait
//! models via [`Transport::recv_any_header`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::{DecompError, Result};

/// The single MPI tag used for every EDEN message (§4.5.1, §6).
pub const WIRE_TAG: i32 = 99;

/// A non-blocking, rank-addressed message transport.
///
/// Every method here mirrors an MPI primitive the engine needs: `send` is a
/// non-blocking point-to-point send, `recv_any_header` models posting an
/// `MPI_ANY_SOURCE` receive for a peer's discovery header, `recv_from` models
/// a receive from a known peer, and `all_reduce_sum` models the periodic
/// termination-detection collective (§4.5 step 3).
pub trait Transport {
    /// This rank's id.
    fn rank(&self) -> u32;
    /// Total rank count in the job.
    fn world_size(&self) -> u32;

    /// Send a tagged byte buffer to `to`. Non-blocking in spirit: the
    /// implementation may buffer internally and return immediately.
    fn send(&self, to: u32, tag: i32, bytes: Vec<u8>) -> Result<()>;

    /// Try to receive a message tagged `tag` from a *known* peer without
    /// blocking. Returns `None` if nothing has arrived yet.
    fn try_recv_from(&self, from: u32, tag: i32) -> Option<Vec<u8>>;

    /// Try to receive a message tagged `tag` from *any* peer without
    /// blocking — the any-source probe used to discover unknown senders
    /// during recv-list exchange. Returns `(source, bytes)`.
    fn try_recv_any(&self, tag: i32) -> Option<(u32, Vec<u8>)>;

    /// Sum `value` across every rank and return the total (blocking).
    fn all_reduce_sum(&self, value: i64) -> Result<i64>;
}

type Mailbox = HashMap<(u32, u32, i32), VecDeque<Vec<u8>>>;

/// Shared state behind every rank's [`LoopbackHandle`] in a single-process
/// simulation of an MPI job: one mailbox keyed by `(from, to, tag)`, and a
/// per-rank outstanding-acknowledgement counter for `all_reduce_sum`.
struct LoopbackState {
    mailbox: RefCell<Mailbox>,
    reduce_values: RefCell<Vec<i64>>,
}

/// A loopback transport: every simulated rank shares one in-process mailbox.
/// Used by tests and by single-process runs with `rank_count == 1`.
#[derive(Clone)]
pub struct LoopbackTransport {
    rank: u32,
    world_size: u32,
    state: Rc<LoopbackState>,
}

impl LoopbackTransport {
    /// Build one handle per rank, all sharing the same mailbox.
    pub fn world(world_size: u32) -> Vec<LoopbackTransport> {
        let state = Rc::new(LoopbackState {
            mailbox: RefCell::new(HashMap::new()),
            reduce_values: RefCell::new(vec![0; world_size as usize]),
        });
        (0..world_size)
            .map(|rank| LoopbackTransport { rank, world_size, state: state.clone() })
            .collect()
    }
}

impl Transport for LoopbackTransport {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn send(&self, to: u32, tag: i32, bytes: Vec<u8>) -> Result<()> {
        self.state.mailbox.borrow_mut().entry((self.rank, to, tag)).or_default().push_back(bytes);
        Ok(())
    }

    fn try_recv_from(&self, from: u32, tag: i32) -> Option<Vec<u8>> {
        self.state.mailbox.borrow_mut().get_mut(&(from, self.rank, tag)).and_then(|q| q.pop_front())
    }

    fn try_recv_any(&self, tag: i32) -> Option<(u32, Vec<u8>)> {
        let mut mailbox = self.state.mailbox.borrow_mut();
        for from in 0..self.world_size {
            if from == self.rank {
                continue;
            }
            if let Some(q) = mailbox.get_mut(&(from, self.rank, tag)) {
                if let Some(bytes) = q.pop_front() {
                    return Some((from, bytes));
                }
            }
        }
        None
    }

    fn all_reduce_sum(&self, value: i64) -> Result<i64> {
        let mut values = self.state.reduce_values.borrow_mut();
        if self.rank as usize >= values.len() {
            return Err(DecompError::Transport(format!("rank {} out of range", self.rank)));
        }
        values[self.rank as usize] = value;
        Ok(values.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recv_from_known_peer() {
        let world = LoopbackTransport::world(2);
        world[0].send(1, WIRE_TAG, b"hello".to_vec()).unwrap();
        assert_eq!(world[1].try_recv_from(0, WIRE_TAG), Some(b"hello".to_vec()));
        assert_eq!(world[1].try_recv_from(0, WIRE_TAG), None);
    }

    #[test]
    fn recv_any_discovers_unknown_sender() {
        let world = LoopbackTransport::world(3);
        world[2].send(1, WIRE_TAG, b"from-2".to_vec()).unwrap();
        let (from, bytes) = world[1].try_recv_any(WIRE_TAG).unwrap();
        assert_eq!(from, 2);
        assert_eq!(bytes, b"from-2");
    }

    #[test]
    fn all_reduce_sum_sees_all_ranks() {
        let world = LoopbackTransport::world(3);
        assert_eq!(world[0].all_reduce_sum(1).unwrap(), 1);
        assert_eq!(world[1].all_reduce_sum(2).unwrap(), 3);
        assert_eq!(world[2].all_reduce_sum(3).unwrap(), 6);
    }
}
