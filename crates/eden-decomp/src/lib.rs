//! Domain decomposer and message planner (§4.5).
//!
//! Splits a model's global ids contiguously across ranks, runs the
//! any-source recv-list discovery protocol so each rank learns what its
//! peers need from it, and defines the per-step mirror sizing and wire
//! format used to exchange remote state once the engine is running.
#![deny(missing_docs)]

pub mod error;
pub mod exchange;
pub mod mirror;
pub mod partition;
pub mod recvlist;
pub mod transport;
pub mod wire;

pub use error::{DecompError, Result};
pub use exchange::exchange_recv_lists;
pub use mirror::{spike_mirror_len, value_mirror_len};
pub use partition::{decompose, owning_rank, RankPartition};
pub use recvlist::{RecvEntry, RecvList, RemoteRef, SendList};
pub use transport::{LoopbackTransport, Transport, WIRE_TAG};
pub use wire::{pack_step_payload, payload_from_bytes, payload_to_bytes, unpack_step_payload};
