//! Recv-list exchange: the two-phase discovery protocol from §4.5.
//!
//! Each rank knows what it wants (its own recv lists, built during
//! instantiation) but not who will ask it for data. This module runs the
//! any-source discovery protocol described in §4.5 over a [`Transport`] and
//! returns, for every rank, the [`SendList`] per peer that asked it for data.
//!
//! Three tags frame the protocol on top of the single wire tag real MPI runs
//! use: a header (byte length), the body (the serialized recv list), and an
//! acknowledgement. Real MPI message matching can fold these into probes on
//! one tag; splitting them here keeps the loopback transport's mailbox
//! lookup trivial without changing the protocol's shape.

use std::collections::HashMap;

use crate::error::{DecompError, Result};
use crate::recvlist::{RecvList, SendList};
use crate::transport::{Transport, WIRE_TAG};

const TAG_HEADER: i32 = WIRE_TAG;
const TAG_BODY: i32 = WIRE_TAG + 1;
const TAG_ACK: i32 = WIRE_TAG + 2;

/// Safety bound on discovery rounds; real runs converge in a handful of
/// rounds since every send has already been queued before the first round.
const MAX_ROUNDS: usize = 10_000;

/// Run the recv-list exchange across every rank's transport handle.
///
/// `recv_lists[r]` maps peer rank -> this rank's recv list for that peer
/// (built during instantiation, §4.5 "Recv list construction"). Returns, per
/// rank, a map from peer rank -> the [`SendList`] this rank must transmit to
/// that peer each step.
pub fn exchange_recv_lists<T: Transport>(
    transports: &[T],
    recv_lists: &[HashMap<u32, RecvList>],
) -> Result<Vec<HashMap<u32, SendList>>> {
    let n = transports.len();
    let mut outstanding = vec![0i64; n];
    let mut send_lists: Vec<HashMap<u32, SendList>> = vec![HashMap::new(); n];

    // Phase 1: fire off every header+body this rank needs to ask for.
    for (r, peers) in recv_lists.iter().enumerate() {
        for (&peer, list) in peers {
            let body = list.to_wire_text().into_bytes();
            let header = (body.len() as u64).to_le_bytes().to_vec();
            transports[r].send(peer, TAG_HEADER, header)?;
            transports[r].send(peer, TAG_BODY, body)?;
            outstanding[r] += 1;
        }
    }

    for _round in 0..MAX_ROUNDS {
        for r in 0..n {
            // Phase 2: answer any header this rank is asked for, re-arming
            // the any-source probe for the next unknown peer each time.
            while let Some((from, header_bytes)) = transports[r].try_recv_any(TAG_HEADER) {
                let len = decode_header(r as u32, &header_bytes)?;
                let body = recv_body_blocking(&transports[r], from, len)?;
                let text = String::from_utf8(body)
                    .map_err(|e| DecompError::MalformedWireLine { peer: from, reason: e.to_string() })?;
                let recv_list = RecvList::from_wire_text(from, &text)?;
                send_lists[r].insert(from, SendList::from_recv_list(&recv_list));
                transports[r].send(from, TAG_ACK, vec![1])?;
            }
            // Collect acknowledgements for headers this rank sent earlier.
            while transports[r].try_recv_any(TAG_ACK).is_some() {
                outstanding[r] -= 1;
            }
        }

        // Phase 3: periodic termination check.
        let mut totals = Vec::with_capacity(n);
        for r in 0..n {
            totals.push(transports[r].all_reduce_sum(outstanding[r])?);
        }
        if totals.iter().all(|&t| t == 0) {
            return Ok(send_lists);
        }
    }

    Err(DecompError::Transport("recv-list exchange did not converge within the round budget".to_string()))
}

fn decode_header(rank: u32, bytes: &[u8]) -> Result<usize> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DecompError::MalformedWireLine { peer: rank, reason: "header must be 8 bytes".to_string() })?;
    Ok(u64::from_le_bytes(arr) as usize)
}

fn recv_body_blocking<T: Transport>(transport: &T, from: u32, expected_len: usize) -> Result<Vec<u8>> {
    // The loopback transport delivers messages in send order, so the body is
    // already queued by the time its header is observed; a real MPI
    // transport would post a matching-length receive here instead of
    // spinning.
    loop {
        if let Some(body) = transport.try_recv_from(from, TAG_BODY) {
            debug_assert_eq!(body.len(), expected_len);
            return Ok(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recvlist::RemoteRef;
    use crate::transport::LoopbackTransport;
    use eden_model::PointOnCell;

    #[test]
    fn two_ranks_symmetric_single_dependency() {
        let world = LoopbackTransport::world(2);
        let mut rank0_wants = HashMap::new();
        let mut list = RecvList::new(1);
        list.push(RemoteRef::VoltagePeer(PointOnCell::new(0, 5, 0, 0.5)));
        rank0_wants.insert(1, list);

        let recv_lists = vec![rank0_wants, HashMap::new()];
        let send_lists = exchange_recv_lists(&world, &recv_lists).unwrap();

        // Rank 1 must now have a send list back to rank 0 with one entry.
        let send_to_0 = send_lists[1].get(&0).expect("rank 1 should have a send list to rank 0");
        assert_eq!(send_to_0.vpeer_count(), 1);
        // Rank 0 asked, so it has no send list of its own.
        assert!(send_lists[0].is_empty());
    }

    #[test]
    fn three_ranks_sparse_mesh() {
        let world = LoopbackTransport::world(3);
        let mut wants = vec![HashMap::new(), HashMap::new(), HashMap::new()];

        let mut l_0_to_2 = RecvList::new(2);
        l_0_to_2.push(RemoteRef::SpikeSource(PointOnCell::new(1, 0, 0, 0.0)));
        wants[0].insert(2, l_0_to_2);

        let mut l_1_to_2 = RecvList::new(2);
        l_1_to_2.push(RemoteRef::DataWriter(eden_model::DataWriterColumn { writer_id: 0, column_id: 1 }));
        wants[1].insert(2, l_1_to_2);

        let send_lists = exchange_recv_lists(&world, &wants).unwrap();

        assert_eq!(send_lists[2].len(), 2);
        assert_eq!(send_lists[2][&0].spike_source_count(), 1);
        assert_eq!(send_lists[2][&1].data_writer_count(), 1);
        assert!(send_lists[0].is_empty());
        assert!(send_lists[1].is_empty());
    }

    #[test]
    fn no_dependencies_converges_immediately() {
        let world = LoopbackTransport::world(4);
        let wants = vec![HashMap::new(); 4];
        let send_lists = exchange_recv_lists(&world, &wants).unwrap();
        assert!(send_lists.iter().all(|m| m.is_empty()));
    }
}
