//! GID-to-rank partitioning (§4.5 "Decomposition").
//!
//! A pure function of `(total_neurons, rank_count)`: every rank computes the
//! same assignment independently, with no coordination required.

use crate::error::{DecompError, Result};
use std::ops::Range;

/// The contiguous range of global neuron ids owned by one rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankPartition {
    /// Rank this partition belongs to.
    pub rank: u32,
    /// Half-open range of GIDs `[start, end)` owned by this rank.
    pub gids: Range<u32>,
}

impl RankPartition {
    /// Whether a GID falls within this rank's partition.
    pub fn owns(&self, gid: u32) -> bool {
        self.gids.contains(&gid)
    }
}

/// Partition `total_neurons` GIDs contiguously across `rank_count` ranks.
///
/// The remainder `total_neurons % rank_count` is distributed one extra GID
/// each to the first `total_neurons % rank_count` ranks, so partition sizes
/// differ by at most one.
pub fn decompose(total_neurons: u32, rank_count: u32) -> Result<Vec<RankPartition>> {
    if rank_count == 0 {
        return Err(DecompError::ZeroRanks { total_neurons });
    }
    let base = total_neurons / rank_count;
    let remainder = total_neurons % rank_count;

    let mut partitions = Vec::with_capacity(rank_count as usize);
    let mut start = 0u32;
    for rank in 0..rank_count {
        let size = base + if rank < remainder { 1 } else { 0 };
        let end = start + size;
        partitions.push(RankPartition { rank, gids: start..end });
        start = end;
    }
    Ok(partitions)
}

/// Find which rank owns a given GID, given the full partition table.
pub fn owning_rank(partitions: &[RankPartition], gid: u32) -> Option<u32> {
    partitions.iter().find(|p| p.owns(gid)).map(|p| p.rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_has_equal_sizes() {
        let parts = decompose(100, 4).unwrap();
        assert_eq!(parts.len(), 4);
        for p in &parts {
            assert_eq!(p.gids.len(), 25);
        }
    }

    #[test]
    fn remainder_distributed_to_first_ranks() {
        let parts = decompose(10, 3).unwrap();
        let sizes: Vec<usize> = parts.iter().map(|p| p.gids.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn partition_covers_every_gid_exactly_once() {
        let total = 37u32;
        let parts = decompose(total, 5).unwrap();
        let mut covered = vec![false; total as usize];
        for p in &parts {
            for gid in p.gids.clone() {
                assert!(!covered[gid as usize], "gid {gid} covered twice");
                covered[gid as usize] = true;
            }
        }
        assert!(covered.into_iter().all(|c| c));
    }

    #[test]
    fn zero_ranks_is_an_error() {
        assert!(matches!(decompose(10, 0), Err(DecompError::ZeroRanks { .. })));
    }

    #[test]
    fn owning_rank_finds_correct_partition() {
        let parts = decompose(10, 3).unwrap();
        assert_eq!(owning_rank(&parts, 0), Some(0));
        assert_eq!(owning_rank(&parts, 9), Some(2));
    }

    #[test]
    fn all_ranks_independently_compute_the_same_table() {
        let a = decompose(53, 6).unwrap();
        let b = decompose(53, 6).unwrap();
        assert_eq!(a, b);
    }
}
