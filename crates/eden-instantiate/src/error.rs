//! Errors raised while instantiating a model into the flat data plane (§7).

use thiserror::Error;

/// Result type for instantiation.
pub type Result<T> = std::result::Result<T, InstantiateError>;

/// Errors raised by the Instantiator.
#[derive(Error, Debug)]
pub enum InstantiateError {
    /// The model failed its own cross-reference validation.
    #[error(transparent)]
    Model(#[from] eden_model::ModelError),

    /// A table operation violated an invariant of the flat data plane.
    #[error(transparent)]
    Tables(#[from] eden_tables::TablesError),

    /// Domain decomposition failed (e.g. zero ranks).
    #[error(transparent)]
    Decomp(#[from] eden_decomp::DecompError),

    /// A population named a cell type id not present in `model.cell_types`.
    #[error("population {population} references unknown cell type {cell_type}")]
    UnknownCellType {
        /// Population id.
        population: u32,
        /// Cell type id referenced.
        cell_type: u32,
    },

    /// A `PointOnCell` named a population id that does not exist.
    #[error("point on cell references unknown population {population}")]
    UnknownPopulation {
        /// Population id referenced.
        population: u32,
    },

    /// A `PointOnCell` named a cell instance past the end of its population.
    #[error("point on cell references cell instance {instance} in population {population}, which only has {size} instances")]
    InstanceOutOfRange {
        /// Population id.
        population: u32,
        /// Instance index referenced.
        instance: u32,
        /// Population size.
        size: u32,
    },

    /// A data writer column could not be resolved to any known point.
    #[error("data writer {writer} column {column} could not be resolved")]
    UnresolvableColumn {
        /// Data writer id.
        writer: u32,
        /// Column id.
        column: u32,
    },
}
