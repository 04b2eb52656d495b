//! Mirror buffer sizing (§4.5 "Mirror buffers").
//!
//! Every step, a rank's remote dependencies are copied into two flat mirror
//! buffers sized once up front from its recv/send lists: a *value mirror*
//! (state_f32, holds incoming voltage-peer and data-writer values) and a
//! *spike mirror* (state_i64, holds outgoing spike trigger bits demanded by
//! peers). These are pure sizing functions; the tables themselves live in
//! [`eden_tables::Tables`].

use crate::recvlist::{RecvList, SendList};

/// Size of the value mirror this rank must allocate to receive from `peer`:
/// one f32 slot per voltage-peer entry plus one per data-writer entry,
/// in recv order (§4.5.1 wire format `[vpeer_values…, daw_values…]`).
pub fn value_mirror_len(recv: &RecvList) -> u32 {
    recv.vpeer_count() + recv.data_writer_count()
}

/// Size of the spike mirror this rank must allocate to answer `peer`'s
/// spike-source requests: one i64 trigger slot per spike-source entry the
/// peer asked for, read during the Send phase and cleared after transmission.
pub fn spike_mirror_len(send: &SendList) -> u32 {
    send.spike_source_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recvlist::RemoteRef;
    use eden_model::{DataWriterColumn, PointOnCell};

    #[test]
    fn value_mirror_counts_vpeer_and_daw_only() {
        let mut recv = RecvList::new(1);
        recv.push(RemoteRef::VoltagePeer(PointOnCell::new(0, 0, 0, 0.5)));
        recv.push(RemoteRef::VoltagePeer(PointOnCell::new(0, 1, 0, 0.5)));
        recv.push(RemoteRef::DataWriter(DataWriterColumn { writer_id: 0, column_id: 0 }));
        recv.push(RemoteRef::SpikeSource(PointOnCell::new(0, 2, 0, 0.0)));
        assert_eq!(value_mirror_len(&recv), 3);
    }

    #[test]
    fn spike_mirror_counts_spike_sources_only() {
        let mut recv = RecvList::new(0);
        recv.push(RemoteRef::SpikeSource(PointOnCell::new(0, 0, 0, 0.0)));
        recv.push(RemoteRef::SpikeSource(PointOnCell::new(0, 1, 0, 0.0)));
        recv.push(RemoteRef::VoltagePeer(PointOnCell::new(0, 2, 0, 0.5)));
        let send = SendList::from_recv_list(&recv);
        assert_eq!(spike_mirror_len(&send), 2);
    }

    #[test]
    fn empty_lists_size_to_zero() {
        let recv = RecvList::new(3);
        assert_eq!(value_mirror_len(&recv), 0);
        let send = SendList::from_recv_list(&recv);
        assert_eq!(spike_mirror_len(&send), 0);
    }
}
