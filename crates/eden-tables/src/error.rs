//! Error types for the flat data plane.

use thiserror::Error;

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TablesError>;

/// Errors raised while building or addressing the flat data plane.
///
/// Per the error taxonomy, these are all "Internal-invariant-broken" or
/// "Model-malformed" conditions: the build phase has no recovery path, it
/// aborts with a diagnostic.
#[derive(Error, Debug)]
pub enum TablesError {
    /// A table index was referenced that does not exist in its family.
    #[error("table index {index} out of bounds in family {family} (have {count} tables)")]
    TableOutOfBounds {
        /// Table family being addressed.
        family: String,
        /// Index that was out of bounds.
        index: u32,
        /// Number of tables that exist in the family.
        count: u32,
    },

    /// An entry index was referenced past the end of a table.
    #[error("entry index {entry} out of bounds in table {table} (length {len})")]
    EntryOutOfBounds {
        /// Table id being addressed.
        table: u32,
        /// Entry index that was out of bounds.
        entry: u32,
        /// Table length.
        len: u32,
    },

    /// Two parallel table families that must stay equal length diverged (I3).
    #[error("parallel tables '{a}' and '{b}' have mismatched lengths ({len_a} vs {len_b})")]
    ParallelLengthMismatch {
        /// Name of the first table.
        a: String,
        /// Name of the second table.
        b: String,
        /// Length of the first table.
        len_a: u32,
        /// Length of the second table.
        len_b: u32,
    },

    /// An index-vector offset was not monotonically non-decreasing (I1).
    #[error("non-monotonic offset for work item {work_item} in index vector '{which}'")]
    NonMonotonicOffset {
        /// Work item whose slice violated monotonicity.
        work_item: u32,
        /// Which of the six index vectors.
        which: String,
    },

    /// A table's reserved alias (`global_const_tabref`/`global_state_tabref`) was
    /// referenced before it had been assigned a real table id.
    #[error("reserved table alias '{which}' was referenced before assignment")]
    UnassignedReservedTable {
        /// Which reserved alias.
        which: String,
    },
}

impl TablesError {
    /// Build a [`TablesError::TableOutOfBounds`].
    pub fn table_out_of_bounds(family: impl Into<String>, index: u32, count: u32) -> Self {
        Self::TableOutOfBounds { family: family.into(), index, count }
    }

    /// Build a [`TablesError::EntryOutOfBounds`].
    pub fn entry_out_of_bounds(table: u32, entry: u32, len: u32) -> Self {
        Self::EntryOutOfBounds { table, entry, len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = TablesError::table_out_of_bounds("const_f32", 5, 3);
        assert!(format!("{e}").contains("const_f32"));

        let e = TablesError::entry_out_of_bounds(2, 10, 4);
        assert!(format!("{e}").contains("entry index 10"));
    }
}
