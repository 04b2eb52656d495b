//! Identifier newtypes for the flat data plane.

use core::fmt;

/// Identifies one work item (cell instance) by its position in instantiation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkItemId(pub u32);

impl WorkItemId {
    /// Create a new work item id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw index value.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wi{}", self.0)
    }
}

/// Identifies one table within a family's backing-store vector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u32);

impl TableId {
    /// Create a new table id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw index value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Sentinel used for `global_const_tabref`/`global_state_tabref` before assignment.
    pub const UNASSIGNED: Self = Self(u32::MAX);

    /// Whether this id has been assigned a real table.
    pub const fn is_assigned(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The four table families plus the two flat scalar vectors they alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableFamily {
    /// `const_f32` — per-instance constants, single write at instantiation.
    ConstF32,
    /// `const_i64` — per-instance constants, including packed cross-references.
    ConstI64,
    /// `state_f32` — double-buffered per-instance state.
    StateF32,
    /// `state_i64` — double-buffered per-instance state, including trigger flags.
    StateI64,
}

impl fmt::Display for TableFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableFamily::ConstF32 => "const_f32",
            TableFamily::ConstI64 => "const_i64",
            TableFamily::StateF32 => "state_f32",
            TableFamily::StateI64 => "state_i64",
        };
        write!(f, "{s}")
    }
}
