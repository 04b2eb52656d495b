//! Model-malformed / Internal-invariant-broken errors raised while
//! partitioning the model across ranks and exchanging recv/send lists (§7).

use thiserror::Error;

/// Result type for domain decomposition and message planning.
pub type Result<T> = std::result::Result<T, DecompError>;

/// Errors raised by [`crate::partition::decompose`], recv-list exchange, or
/// wire (de)serialization.
#[derive(Error, Debug)]
pub enum DecompError {
    /// `rank_count` was zero; partitioning is undefined.
    #[error("cannot decompose {total_neurons} neurons across zero ranks")]
    ZeroRanks {
        /// Total neuron count that was being partitioned.
        total_neurons: u32,
    },

    /// A recv-list header or body line could not be parsed.
    #[error("malformed recv-list wire line at peer {peer}: {reason}")]
    MalformedWireLine {
        /// Peer rank the line was read from.
        peer: u32,
        /// Parse failure detail.
        reason: String,
    },

    /// Recv/send list symmetry (P5) was violated: a rank's recv list names a
    /// peer that never produced a matching send list, or vice versa.
    #[error("recv/send list symmetry violated between rank {a} and rank {b}: {reason}")]
    SymmetryViolation {
        /// First rank in the mismatched pair.
        a: u32,
        /// Second rank in the mismatched pair.
        b: u32,
        /// Detail of the mismatch.
        reason: String,
    },

    /// A transport operation failed (loopback mailbox corruption, or a real
    /// transport's I/O failure).
    #[error("transport error: {0}")]
    Transport(String),
}
