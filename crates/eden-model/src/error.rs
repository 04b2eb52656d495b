//! Model-malformed errors (§7): declarations that are missing or contradictory.

use thiserror::Error;

/// Result type for model validation.
pub type Result<T> = std::result::Result<T, ModelError>;

/// A model-malformed condition detected before codegen or instantiation.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A population referenced a cell type id that does not exist.
    #[error("population '{population}' references unknown cell type {cell_type}")]
    UnknownCellType {
        /// Population name.
        population: String,
        /// Cell type id referenced.
        cell_type: u32,
    },

    /// A projection endpoint names a spiking connection onto a compartment
    /// with no spike threshold.
    #[error("projection '{projection}' connects a spiking synapse onto compartment {segment} of population '{population}', which declares no threshold")]
    SpikingConnectionWithoutThreshold {
        /// Projection name.
        projection: String,
        /// Target population.
        population: String,
        /// Target segment id.
        segment: u32,
    },

    /// A data writer column names a point that cannot be resolved against any population.
    #[error("data writer '{writer}' column {column} references an unresolvable point on cell")]
    UnresolvableColumn {
        /// Data writer id.
        writer: String,
        /// Column id within the writer.
        column: u32,
    },

    /// `SimulatorConfig` carries a value outside its recognized domain.
    #[error("invalid simulator config field '{field}': {reason}")]
    InvalidConfig {
        /// Field name.
        field: String,
        /// Why it is invalid.
        reason: String,
    },
}
