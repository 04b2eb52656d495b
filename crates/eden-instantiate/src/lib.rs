//! The Instantiator (§4.4): turns a validated [`eden_model::Model`] plus a
//! rank/rank-count pair into one rank's slice of the flat data plane.
//!
//! Three things happen here, in order:
//! 1. Every population instance owned by this rank gets a work item: an RNG
//!    seed constant and one voltage state slot per segment.
//! 2. Every input, projection connection, and data-writer column touching a
//!    locally-owned instance is resolved — directly to a packed reference
//!    when its target is also local, or to a recv-list entry and a
//!    placeholder when it isn't.
//! 3. Voltage-peer and data-writer placeholders are patched immediately
//!    (this rank already knows its own recv-list shape); spike-recipient
//!    placeholders are left pending until the cross-rank recv-list exchange
//!    (§4.5, [`eden_decomp::exchange_recv_lists`]) resolves them via
//!    [`finalize_spike_recipients`].

#![deny(missing_docs)]

pub mod error;
pub mod gid;
mod instantiate;
pub mod layout;
pub mod seed;

pub use error::{InstantiateError, Result};
pub use instantiate::{finalize_spike_recipients, instantiate, ColumnSource, InstantiationResult, PendingSpikeRecipient, ResolvedColumn};
pub use layout::InstanceRecord;
