//! Recv/send list construction and their text wire encoding (§4.5 "Recv list
//! construction" and "Recv-list exchange").
//!
//! During instantiation, whenever a cross-reference names a [`PointOnCell`]
//! (or [`DataWriterColumn`]) on a remote rank, the local rank records an
//! entry here instead of resolving it immediately. The recv-list exchange
//! protocol (§4.5 step 1-3, see [`crate::exchange`]) turns each rank's recv
//! lists into the peers' send lists.

use eden_model::{DataWriterColumn, PointOnCell};

use crate::error::{DecompError, Result};

/// One kind of remote dependency a rank can record against a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRef {
    /// A gap-junction (or other continuous) peer voltage.
    VoltagePeer(PointOnCell),
    /// A trajectory logger column sourced from a remote cell.
    DataWriter(DataWriterColumn),
    /// A spiking connection's presynaptic source.
    SpikeSource(PointOnCell),
}

/// One entry in a [`RecvList`]: a remote dependency plus the index this rank
/// will read it at once the peer's values are scattered into the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvEntry {
    /// What this rank needs from the peer.
    pub item: RemoteRef,
    /// Position within this recv list's ordering (also the wire-order index
    /// the peer must send values/spikes back in).
    pub index: u32,
}

/// Everything one rank needs to receive from one peer rank, in the order
/// entries were recorded during instantiation (§4.5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecvList {
    /// Peer rank this list addresses.
    pub peer: u32,
    /// Entries, in recv order. Indices are contiguous starting at 0 within
    /// each of the three sub-kinds the wire header separately counts.
    pub entries: Vec<RecvEntry>,
}

impl RecvList {
    /// Create an empty recv list for a peer.
    pub fn new(peer: u32) -> Self {
        Self { peer, entries: Vec::new() }
    }

    /// Append a dependency, returning the index it was assigned.
    pub fn push(&mut self, item: RemoteRef) -> u32 {
        let index = self.count_of_same_kind(&item);
        self.entries.push(RecvEntry { item, index });
        index
    }

    fn count_of_same_kind(&self, item: &RemoteRef) -> u32 {
        self.entries
            .iter()
            .filter(|e| std::mem::discriminant(&e.item) == std::mem::discriminant(item))
            .count() as u32
    }

    /// Number of voltage-peer entries.
    pub fn vpeer_count(&self) -> u32 {
        self.entries.iter().filter(|e| matches!(e.item, RemoteRef::VoltagePeer(_))).count() as u32
    }

    /// Number of data-writer-column entries.
    pub fn data_writer_count(&self) -> u32 {
        self.entries.iter().filter(|e| matches!(e.item, RemoteRef::DataWriter(_))).count() as u32
    }

    /// Number of spike-source entries.
    pub fn spike_source_count(&self) -> u32 {
        self.entries.iter().filter(|e| matches!(e.item, RemoteRef::SpikeSource(_))).count() as u32
    }

    /// Serialize to the text wire format used during discovery (§4.5 step 1):
    /// a header line with the three counts, then one newline-delimited
    /// encoded line per entry.
    pub fn to_wire_text(&self) -> String {
        let mut out = format!(
            "{} {} {}\n",
            self.vpeer_count(),
            self.data_writer_count(),
            self.spike_source_count()
        );
        for entry in &self.entries {
            out.push_str(&encode_entry(&entry.item));
            out.push('\n');
        }
        out
    }

    /// Parse the text wire format back into a [`RecvList`] for `peer`.
    pub fn from_wire_text(peer: u32, text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| DecompError::MalformedWireLine {
            peer,
            reason: "missing header line".to_string(),
        })?;
        let counts: Vec<u32> = header
            .split_whitespace()
            .map(|s| s.parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| DecompError::MalformedWireLine { peer, reason: e.to_string() })?;
        if counts.len() != 3 {
            return Err(DecompError::MalformedWireLine {
                peer,
                reason: format!("expected 3 header counts, got {}", counts.len()),
            });
        }
        let total: u32 = counts.iter().sum();

        let mut list = RecvList::new(peer);
        for _ in 0..total {
            let line = lines.next().ok_or_else(|| DecompError::MalformedWireLine {
                peer,
                reason: "fewer entry lines than the header promised".to_string(),
            })?;
            let item = decode_entry(peer, line)?;
            list.push(item);
        }
        Ok(list)
    }
}

fn encode_entry(item: &RemoteRef) -> String {
    match item {
        RemoteRef::VoltagePeer(p) => format!("V {} {} {} {}", p.population, p.cell_instance, p.segment, p.fraction_along_permille),
        RemoteRef::DataWriter(c) => format!("D {} {}", c.writer_id, c.column_id),
        RemoteRef::SpikeSource(p) => format!("S {} {} {} {}", p.population, p.cell_instance, p.segment, p.fraction_along_permille),
    }
}

fn decode_entry(peer: u32, line: &str) -> Result<RemoteRef> {
    let mut parts = line.split_whitespace();
    let kind = parts.next().ok_or_else(|| DecompError::MalformedWireLine {
        peer,
        reason: "empty entry line".to_string(),
    })?;
    let rest: Vec<&str> = parts.collect();
    let bad = |reason: String| DecompError::MalformedWireLine { peer, reason };
    let parse_u32 = |s: &str| s.parse::<u32>().map_err(|e| bad(e.to_string()));
    match kind {
        "V" | "S" => {
            if rest.len() != 4 {
                return Err(bad(format!("expected 4 fields for {kind}, got {}", rest.len())));
            }
            let point = PointOnCell {
                population: parse_u32(rest[0])?,
                cell_instance: parse_u32(rest[1])?,
                segment: parse_u32(rest[2])?,
                fraction_along_permille: rest[3].parse().map_err(|e: std::num::ParseIntError| bad(e.to_string()))?,
            };
            Ok(if kind == "V" { RemoteRef::VoltagePeer(point) } else { RemoteRef::SpikeSource(point) })
        }
        "D" => {
            if rest.len() != 2 {
                return Err(bad(format!("expected 2 fields for D, got {}", rest.len())));
            }
            Ok(RemoteRef::DataWriter(DataWriterColumn {
                writer_id: parse_u32(rest[0])?,
                column_id: parse_u32(rest[1])?,
            }))
        }
        other => Err(bad(format!("unknown entry kind '{other}'"))),
    }
}

/// Everything one rank must transmit to one peer rank, in the order the
/// peer's [`RecvList`] named them (P5 symmetry).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendList {
    /// Peer rank this list addresses.
    pub peer: u32,
    /// Entries, mirroring the peer's recv list order exactly.
    pub entries: Vec<RecvEntry>,
}

impl SendList {
    /// Build a send list from a peer's serialized recv list.
    pub fn from_recv_list(recv: &RecvList) -> Self {
        Self { peer: recv.peer, entries: recv.entries.clone() }
    }

    /// Number of voltage-peer entries this rank must send.
    pub fn vpeer_count(&self) -> u32 {
        self.entries.iter().filter(|e| matches!(e.item, RemoteRef::VoltagePeer(_))).count() as u32
    }

    /// Number of data-writer-column entries this rank must send.
    pub fn data_writer_count(&self) -> u32 {
        self.entries.iter().filter(|e| matches!(e.item, RemoteRef::DataWriter(_))).count() as u32
    }

    /// Number of spike-source entries this rank must send.
    pub fn spike_source_count(&self) -> u32 {
        self.entries.iter().filter(|e| matches!(e.item, RemoteRef::SpikeSource(_))).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_list() -> RecvList {
        let mut list = RecvList::new(1);
        list.push(RemoteRef::VoltagePeer(PointOnCell::new(0, 0, 0, 0.5)));
        list.push(RemoteRef::DataWriter(DataWriterColumn { writer_id: 0, column_id: 2 }));
        list.push(RemoteRef::SpikeSource(PointOnCell::new(0, 1, 0, 0.0)));
        list.push(RemoteRef::VoltagePeer(PointOnCell::new(0, 2, 0, 1.0)));
        list
    }

    #[test]
    fn indices_assigned_per_kind() {
        let list = sample_list();
        assert_eq!(list.entries[0].index, 0); // first vpeer
        assert_eq!(list.entries[3].index, 1); // second vpeer
        assert_eq!(list.vpeer_count(), 2);
        assert_eq!(list.data_writer_count(), 1);
        assert_eq!(list.spike_source_count(), 1);
    }

    #[test]
    fn wire_roundtrip_preserves_entries() {
        let list = sample_list();
        let text = list.to_wire_text();
        let parsed = RecvList::from_wire_text(list.peer, &text).unwrap();
        assert_eq!(parsed.entries, list.entries);
    }

    #[test]
    fn malformed_header_is_rejected() {
        let err = RecvList::from_wire_text(0, "not a header\n").unwrap_err();
        assert!(matches!(err, DecompError::MalformedWireLine { .. }));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let err = RecvList::from_wire_text(0, "1 0 0\n").unwrap_err();
        assert!(matches!(err, DecompError::MalformedWireLine { .. }));
    }

    #[test]
    fn send_list_mirrors_recv_list_order() {
        let recv = sample_list();
        let send = SendList::from_recv_list(&recv);
        assert_eq!(send.entries, recv.entries);
        assert_eq!(send.vpeer_count(), recv.vpeer_count());
    }
}
