//! Errors raised while instantiating or stepping the time-stepping engine
//! (§7): wraps the failures of every upstream crate plus the engine's own
//! trajectory-log I/O.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while building or running a simulation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Model validation or `SimulatorConfig` validation failed (Model-malformed).
    #[error(transparent)]
    Model(#[from] eden_model::ModelError),

    /// A table invariant was violated while populating the data plane
    /// (Internal-invariant-broken).
    #[error(transparent)]
    Tables(#[from] eden_tables::TablesError),

    /// Instantiation failed (Model-malformed or Internal-invariant-broken).
    #[error(transparent)]
    Instantiate(#[from] eden_instantiate::InstantiateError),

    /// Domain decomposition or recv-list exchange failed.
    #[error(transparent)]
    Decomp(#[from] eden_decomp::DecompError),

    /// Kernel emission, compilation, or dynamic loading failed (Codegen-failed).
    #[error(transparent)]
    Codegen(#[from] eden_codegen::CodegenError),

    /// Opening or writing a trajectory logger's output file failed.
    #[error("trajectory logger '{path}' failed: {source}")]
    TrajectoryIo {
        /// File path that could not be opened or written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A work item was dispatched against a cell type with no loaded kernel
    /// (Internal-invariant-broken — the build phase should have rejected
    /// this model before the engine ever started stepping).
    #[error("no loaded kernel for cell type {cell_type}")]
    MissingKernel {
        /// Cell type id missing a compiled kernel.
        cell_type: u32,
    },

    /// The recv-list exchange or step loop exceeded its configured bound
    /// without converging (Resource-exhausted).
    #[error("{what} did not converge within {limit} rounds")]
    DidNotConverge {
        /// What failed to converge.
        what: String,
        /// The round/step bound that was exceeded.
        limit: usize,
    },

    /// A step payload received from `peer` had the wrong byte length or
    /// section sizes for that peer's recv list.
    #[error("malformed step payload received from peer {peer}")]
    MalformedPayload {
        /// Peer rank the payload came from.
        peer: u32,
    },
}
