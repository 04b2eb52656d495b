//! The flat data plane: parallel tables of scalar constants, scalar state,
//! and variable-length per-work-item tables, in four families plus two flat
//! scalar vectors aliased into the table address space.
//!
//! This crate owns the append-only construction contract used by the
//! signature builder and instantiator (§4.1), and the packed cross-reference
//! encoding shared by generated kernels and the wire format.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod packed;

pub use error::{Result, TablesError};
pub use ids::{TableFamily, TableId, WorkItemId};
pub use packed::PackedRef;

/// Per-work-item starting offsets into the six index vectors (I1, I2).
#[derive(Debug, Default, Clone)]
struct WorkItemSlices {
    const_f32_index: Vec<u32>,
    state_f32_index: Vec<u32>,
    table_const_f32_index: Vec<u32>,
    table_const_i64_index: Vec<u32>,
    table_state_f32_index: Vec<u32>,
    table_state_i64_index: Vec<u32>,
}

/// The flat data plane described in §3/§4.1.
///
/// Construction is append-only and single-pass: call [`Tables::begin_work_item`]
/// before appending any scalars/tables for a new work item, so the six index
/// vectors record its starting offsets.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    /// Flat scalar constants, shared by all work items (aliased via `global_const_tabref`).
    pub global_constants: Vec<f32>,
    /// Flat scalar initial state (aliased via `global_state_tabref`); mirrored into both buffers.
    pub global_initial_state: Vec<f32>,

    /// `const_f32` tables, one `Vec<f32>` per table.
    pub const_f32: Vec<Vec<f32>>,
    /// `const_i64` tables, one `Vec<i64>` per table (including packed cross-references).
    pub const_i64: Vec<Vec<i64>>,
    /// `state_f32` tables, "now" buffer.
    pub state_f32_now: Vec<Vec<f32>>,
    /// `state_f32` tables, "next" buffer.
    pub state_f32_next: Vec<Vec<f32>>,
    /// `state_i64` tables, "now" buffer (includes trigger tables).
    pub state_i64_now: Vec<Vec<i64>>,
    /// `state_i64` tables, "next" buffer.
    pub state_i64_next: Vec<Vec<i64>>,

    slices: WorkItemSlices,
    work_item_count: u32,

    /// Reserved table index aliasing `global_constants` into the `const_f32` address space.
    pub global_const_tabref: TableId,
    /// Reserved table index aliasing `global_initial_state`/state buffers into the `state_f32` address space.
    pub global_state_tabref: TableId,
}

/// The starting offsets of one work item's slice into each of the six index
/// vectors, as snapshotted by [`Tables::begin_work_item`] (I1, I2). The
/// engine's compute dispatch uses these to build the per-work-item table
/// pointer arrays the emitted `doit` kernel expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItemOffsets {
    /// Starting offset into `global_constants`.
    pub const_f32_offset: u32,
    /// Starting offset into `global_initial_state`/state buffers.
    pub state_f32_offset: u32,
    /// Starting index into `const_f32` (first table owned by this work item).
    pub table_const_f32_start: u32,
    /// Starting index into `const_i64`.
    pub table_const_i64_start: u32,
    /// Starting index into `state_f32_now`/`state_f32_next`.
    pub table_state_f32_start: u32,
    /// Starting index into `state_i64_now`/`state_i64_next`.
    pub table_state_i64_start: u32,
}

impl Tables {
    /// Create an empty table set; reserved aliases start unassigned.
    pub fn new() -> Self {
        Self {
            global_const_tabref: TableId::UNASSIGNED,
            global_state_tabref: TableId::UNASSIGNED,
            ..Default::default()
        }
    }

    /// Begin a new work item's slice, snapshotting current lengths as its
    /// starting offsets into all six index vectors (I1).
    pub fn begin_work_item(&mut self) -> WorkItemId {
        let id = WorkItemId::new(self.work_item_count);
        self.slices.const_f32_index.push(self.global_constants.len() as u32);
        self.slices.state_f32_index.push(self.global_initial_state.len() as u32);
        self.slices.table_const_f32_index.push(self.const_f32.len() as u32);
        self.slices.table_const_i64_index.push(self.const_i64.len() as u32);
        self.slices.table_state_f32_index.push(self.state_f32_now.len() as u32);
        self.slices.table_state_i64_index.push(self.state_i64_now.len() as u32);
        self.work_item_count += 1;
        id
    }

    /// Append a scalar constant; returns its index in `global_constants`.
    pub fn append_scalar_constant(&mut self, value: f32) -> u32 {
        let idx = self.global_constants.len() as u32;
        self.global_constants.push(value);
        idx
    }

    /// Append a scalar state variable with its initial value; returns its
    /// index, shared by both the now and next buffers at the start of
    /// simulation (§3 "Initial state is populated into both buffers").
    pub fn append_scalar_state(&mut self, initial: f32) -> u32 {
        let idx = self.global_initial_state.len() as u32;
        self.global_initial_state.push(initial);
        idx
    }

    /// Start a new `const_f32` table; returns its table index.
    pub fn append_table_const_f32(&mut self) -> TableId {
        let id = TableId::new(self.const_f32.len() as u32);
        self.const_f32.push(Vec::new());
        id
    }

    /// Start a new `const_i64` table; returns its table index.
    pub fn append_table_const_i64(&mut self) -> TableId {
        let id = TableId::new(self.const_i64.len() as u32);
        self.const_i64.push(Vec::new());
        id
    }

    /// Start a new `state_f32` table (now/next kept in lockstep); returns its table index.
    pub fn append_table_state_f32(&mut self) -> TableId {
        let id = TableId::new(self.state_f32_now.len() as u32);
        self.state_f32_now.push(Vec::new());
        self.state_f32_next.push(Vec::new());
        id
    }

    /// Start a new `state_i64` table (now/next kept in lockstep); returns its table index.
    pub fn append_table_state_i64(&mut self) -> TableId {
        let id = TableId::new(self.state_i64_now.len() as u32);
        self.state_i64_now.push(Vec::new());
        self.state_i64_next.push(Vec::new());
        id
    }

    /// Push a value onto a `const_f32` table, growing it by one entry.
    pub fn push_entry_const_f32(&mut self, table: TableId, value: f32) -> Result<u32> {
        let t = self.const_f32.get_mut(table.raw() as usize).ok_or_else(|| {
            TablesError::table_out_of_bounds("const_f32", table.raw(), self.const_f32.len() as u32)
        })?;
        let entry = t.len() as u32;
        t.push(value);
        Ok(entry)
    }

    /// Push a value onto a `const_i64` table, growing it by one entry.
    pub fn push_entry_const_i64(&mut self, table: TableId, value: i64) -> Result<u32> {
        let t = self.const_i64.get_mut(table.raw() as usize).ok_or_else(|| {
            TablesError::table_out_of_bounds("const_i64", table.raw(), self.const_i64.len() as u32)
        })?;
        let entry = t.len() as u32;
        t.push(value);
        Ok(entry)
    }

    /// Push a value onto a `state_f32` table (both now and next, matching
    /// initial state being populated into both buffers), growing it by one entry.
    pub fn push_entry_state_f32(&mut self, table: TableId, initial: f32) -> Result<u32> {
        let now = self.state_f32_now.get_mut(table.raw() as usize).ok_or_else(|| {
            TablesError::table_out_of_bounds("state_f32", table.raw(), self.state_f32_now.len() as u32)
        })?;
        let entry = now.len() as u32;
        now.push(initial);
        self.state_f32_next[table.raw() as usize].push(f32::NAN);
        Ok(entry)
    }

    /// Push a value onto a `state_i64` table (both now and next), growing it by one entry.
    pub fn push_entry_state_i64(&mut self, table: TableId, initial: i64) -> Result<u32> {
        let now = self.state_i64_now.get_mut(table.raw() as usize).ok_or_else(|| {
            TablesError::table_out_of_bounds("state_i64", table.raw(), self.state_i64_now.len() as u32)
        })?;
        let entry = now.len() as u32;
        now.push(initial);
        self.state_i64_next[table.raw() as usize].push(0);
        Ok(entry)
    }

    /// Total number of work items whose slices have been started.
    pub fn work_item_count(&self) -> u32 {
        self.work_item_count
    }

    /// The starting offsets recorded for `id` by [`Tables::begin_work_item`].
    ///
    /// Returns `None` if `id` was never begun (index past `work_item_count`).
    pub fn work_item_offsets(&self, id: WorkItemId) -> Option<WorkItemOffsets> {
        let i = id.raw() as usize;
        Some(WorkItemOffsets {
            const_f32_offset: *self.slices.const_f32_index.get(i)?,
            state_f32_offset: *self.slices.state_f32_index.get(i)?,
            table_const_f32_start: *self.slices.table_const_f32_index.get(i)?,
            table_const_i64_start: *self.slices.table_const_i64_index.get(i)?,
            table_state_f32_start: *self.slices.table_state_f32_index.get(i)?,
            table_state_i64_start: *self.slices.table_state_i64_index.get(i)?,
        })
    }

    /// Number of `const_f32` tables owned by work item `id` — the slice from
    /// its recorded start to either the next work item's start or the end of
    /// `const_f32` for the last work item.
    pub fn table_const_f32_count(&self, id: WorkItemId) -> u32 {
        self.table_family_count(id, &self.slices.table_const_f32_index, self.const_f32.len() as u32)
    }

    /// Number of `const_i64` tables owned by work item `id`.
    pub fn table_const_i64_count(&self, id: WorkItemId) -> u32 {
        self.table_family_count(id, &self.slices.table_const_i64_index, self.const_i64.len() as u32)
    }

    /// Number of `state_f32` tables owned by work item `id`.
    pub fn table_state_f32_count(&self, id: WorkItemId) -> u32 {
        self.table_family_count(id, &self.slices.table_state_f32_index, self.state_f32_now.len() as u32)
    }

    /// Number of `state_i64` tables owned by work item `id`.
    pub fn table_state_i64_count(&self, id: WorkItemId) -> u32 {
        self.table_family_count(id, &self.slices.table_state_i64_index, self.state_i64_now.len() as u32)
    }

    fn table_family_count(&self, id: WorkItemId, index: &[u32], family_len: u32) -> u32 {
        let i = id.raw() as usize;
        let Some(&start) = index.get(i) else { return 0 };
        let end = index.get(i + 1).copied().unwrap_or(family_len);
        end.saturating_sub(start)
    }

    /// Validate invariant I3: named parallel tables (e.g. weight/delay for the
    /// same synapse population) must have equal length.
    pub fn check_parallel_f32(&self, a_name: &str, a: TableId, b_name: &str, b: TableId) -> Result<()> {
        let len_a = self.const_f32[a.raw() as usize].len() as u32;
        let len_b = self.const_f32[b.raw() as usize].len() as u32;
        if len_a != len_b {
            return Err(TablesError::ParallelLengthMismatch {
                a: a_name.to_string(),
                b: b_name.to_string(),
                len_a,
                len_b,
            });
        }
        Ok(())
    }

    /// Validate invariant I4 (reference validity, P4): every packed reference
    /// stored in an `*_i64` table points at an existing table and a valid entry.
    pub fn validate_reference(&self, r: PackedRef, family: TableFamily) -> Result<()> {
        let (tables, table_lens): (usize, u32) = match family {
            TableFamily::ConstI64 => (
                self.const_i64.len(),
                self.const_i64.get(r.table as usize).map(|t| t.len() as u32).unwrap_or(0),
            ),
            TableFamily::StateI64 => (
                self.state_i64_now.len(),
                self.state_i64_now.get(r.table as usize).map(|t| t.len() as u32).unwrap_or(0),
            ),
            _ => return Ok(()),
        };
        if r.table as usize >= tables {
            return Err(TablesError::table_out_of_bounds(family.to_string(), r.table as u32, tables as u32));
        }
        if r.entry as u32 >= table_lens {
            return Err(TablesError::entry_out_of_bounds(r.table as u32, r.entry as u32, table_lens));
        }
        Ok(())
    }

    /// Swap the "now" and "next" pointer triples for all double-buffered
    /// families, as performed at the end of each timestep (§4.6 swap phase).
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.state_f32_now, &mut self.state_f32_next);
        std::mem::swap(&mut self.state_i64_now, &mut self.state_i64_next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_work_item_records_offsets() {
        let mut t = Tables::new();
        let w0 = t.begin_work_item();
        t.append_scalar_constant(1.0);
        t.append_scalar_constant(2.0);
        let w1 = t.begin_work_item();
        t.append_scalar_constant(3.0);

        assert_eq!(w0.raw(), 0);
        assert_eq!(w1.raw(), 1);
        assert_eq!(t.slices.const_f32_index, vec![0, 2]);
    }

    #[test]
    fn table_append_and_push() {
        let mut t = Tables::new();
        t.begin_work_item();
        let table = t.append_table_const_f32();
        t.push_entry_const_f32(table, 1.0).unwrap();
        t.push_entry_const_f32(table, 2.0).unwrap();
        assert_eq!(t.const_f32[table.raw() as usize], vec![1.0, 2.0]);
    }

    #[test]
    fn push_out_of_bounds_table_errors() {
        let mut t = Tables::new();
        let bogus = TableId::new(99);
        let err = t.push_entry_const_f32(bogus, 1.0).unwrap_err();
        assert!(matches!(err, TablesError::TableOutOfBounds { .. }));
    }

    #[test]
    fn parallel_length_mismatch_detected() {
        let mut t = Tables::new();
        t.begin_work_item();
        let weight = t.append_table_const_f32();
        let delay = t.append_table_const_f32();
        t.push_entry_const_f32(weight, 1.0).unwrap();
        t.push_entry_const_f32(weight, 2.0).unwrap();
        t.push_entry_const_f32(delay, 1.0).unwrap();

        let err = t.check_parallel_f32("weight", weight, "delay", delay).unwrap_err();
        assert!(matches!(err, TablesError::ParallelLengthMismatch { .. }));
    }

    #[test]
    fn reference_validity_p4() {
        let mut t = Tables::new();
        t.begin_work_item();
        let trig = t.append_table_state_i64();
        t.push_entry_state_i64(trig, 0).unwrap();

        let valid = PackedRef::new(trig.raw() as u64, 0);
        assert!(t.validate_reference(valid, TableFamily::StateI64).is_ok());

        let invalid = PackedRef::new(trig.raw() as u64, 5);
        assert!(t.validate_reference(invalid, TableFamily::StateI64).is_err());
    }

    #[test]
    fn swap_buffers_exchanges_now_and_next() {
        let mut t = Tables::new();
        t.begin_work_item();
        let v = t.append_table_state_f32();
        t.push_entry_state_f32(v, 1.0).unwrap();
        t.state_f32_next[v.raw() as usize][0] = 2.0;

        t.swap_buffers();
        assert_eq!(t.state_f32_now[v.raw() as usize][0], 2.0);
    }

    #[test]
    fn work_item_offsets_and_table_counts_are_per_item() {
        let mut t = Tables::new();
        let w0 = t.begin_work_item();
        t.append_table_const_f32();
        t.append_table_const_f32();
        let w1 = t.begin_work_item();
        t.append_table_const_f32();

        let off0 = t.work_item_offsets(w0).unwrap();
        let off1 = t.work_item_offsets(w1).unwrap();
        assert_eq!(off0.table_const_f32_start, 0);
        assert_eq!(off1.table_const_f32_start, 2);
        assert_eq!(t.table_const_f32_count(w0), 2);
        assert_eq!(t.table_const_f32_count(w1), 1);
    }

    #[test]
    fn work_item_offsets_unknown_id_is_none() {
        let t = Tables::new();
        assert!(t.work_item_offsets(WorkItemId::new(0)).is_none());
    }
}
