//! Per-instance bookkeeping built up while walking the model (§4.4).
//!
//! Every cell instance gets exactly one [`InstanceRecord`]: its voltage and
//! RNG-seed scalar indices are always present. Three tables are claimed
//! eagerly, at a fixed ordinal within the work item's slice, because the
//! emitted kernel (which only ever sees cell-type-level code, never
//! per-instance knowledge) needs to find them without an extra constant
//! threaded through the signature: the pulse-input table (`const_f32`
//! ordinal 0), the spike-list-input table (`const_f32` ordinal 1), and the
//! spike-recipients table (`const_i64` ordinal 0). The remaining network
//! tables (`vpeer_refs`, `trigger`, the component-input table) are allocated
//! lazily, the first time a projection or input actually needs them, since
//! most instances won't need all of them and nothing in the emitted kernel
//! needs to address them at a fixed ordinal.

use eden_tables::{TableId, Tables, WorkItemId};

/// Everything recorded about one local cell instance during instantiation.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    /// This instance's work item id.
    pub work_item: WorkItemId,
    /// Index of this instance's RNG seed constant in `global_constants`.
    pub rng_seed_index: u32,
    /// Index of each segment's voltage state in `global_initial_state`, in
    /// segment order.
    pub voltage_indices: Vec<u32>,
    /// `const_i64` table of packed references to peer voltages for gap
    /// junctions this instance participates in (allocated on first use).
    pub vpeer_table: Option<TableId>,
    /// `const_i64` table of packed `(trigger_table, entry)` references this
    /// instance must OR-write into when it spikes; always the first
    /// `const_i64` table of the work item's slice (possibly empty).
    pub spike_recipients_table: Option<TableId>,
    /// `state_i64` table of this instance's own incoming trigger flags, one
    /// entry per incoming spiking connection (allocated on first use).
    pub trigger_table: Option<TableId>,
    /// `const_f32` table of `(amplitude, start, duration, target_segment)`
    /// quadruples for pulse inputs targeting this instance; always the first
    /// `const_f32` table of the work item's slice (possibly empty), so the
    /// emitted kernel can find it at a fixed ordinal (§4.4, §4.3).
    pub pulse_table: Option<TableId>,
    /// `const_f32` table of concatenated spike-list times (with a trailing
    /// `+inf` sentinel per list) for spike-list inputs targeting this
    /// instance; always the second `const_f32` table of the work item's
    /// slice (possibly empty).
    pub spike_list_table: Option<TableId>,
    /// `const_f32` table of flattened parameter values for LEMS-component
    /// inputs targeting this instance.
    pub component_table: Option<TableId>,
}

impl InstanceRecord {
    /// Start a record for a freshly-begun work item with its scalar slots
    /// already written.
    pub fn new(work_item: WorkItemId, rng_seed_index: u32, voltage_indices: Vec<u32>) -> Self {
        Self {
            work_item,
            rng_seed_index,
            voltage_indices,
            vpeer_table: None,
            spike_recipients_table: None,
            trigger_table: None,
            pulse_table: None,
            spike_list_table: None,
            component_table: None,
        }
    }
}

/// Get this instance's `vpeer_refs` table, allocating it on first use.
pub fn ensure_vpeer_table(tables: &mut Tables, rec: &mut InstanceRecord) -> TableId {
    *rec.vpeer_table.get_or_insert_with(|| tables.append_table_const_i64())
}

/// Get this instance's `spike_recipients` table, allocating it on first use.
pub fn ensure_spike_recipients_table(tables: &mut Tables, rec: &mut InstanceRecord) -> TableId {
    *rec.spike_recipients_table.get_or_insert_with(|| tables.append_table_const_i64())
}

/// Get this instance's `trigger` table, allocating it on first use.
pub fn ensure_trigger_table(tables: &mut Tables, rec: &mut InstanceRecord) -> TableId {
    *rec.trigger_table.get_or_insert_with(|| tables.append_table_state_i64())
}

/// Get this instance's pulse-input table, allocating it on first use.
pub fn ensure_pulse_table(tables: &mut Tables, rec: &mut InstanceRecord) -> TableId {
    *rec.pulse_table.get_or_insert_with(|| tables.append_table_const_f32())
}

/// Get this instance's spike-list-input table, allocating it on first use.
pub fn ensure_spike_list_table(tables: &mut Tables, rec: &mut InstanceRecord) -> TableId {
    *rec.spike_list_table.get_or_insert_with(|| tables.append_table_const_f32())
}

/// Get this instance's LEMS-component-input table, allocating it on first use.
pub fn ensure_component_table(tables: &mut Tables, rec: &mut InstanceRecord) -> TableId {
    *rec.component_table.get_or_insert_with(|| tables.append_table_const_f32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_vpeer_table_allocates_once() {
        let mut tables = Tables::new();
        tables.begin_work_item();
        let mut rec = InstanceRecord::new(WorkItemId::new(0), 0, vec![0]);
        let t1 = ensure_vpeer_table(&mut tables, &mut rec);
        let t2 = ensure_vpeer_table(&mut tables, &mut rec);
        assert_eq!(t1, t2);
        assert_eq!(tables.const_i64.len(), 1);
    }

    #[test]
    fn distinct_tables_allocated_independently() {
        let mut tables = Tables::new();
        tables.begin_work_item();
        let mut rec = InstanceRecord::new(WorkItemId::new(0), 0, vec![0]);
        let vpeer = ensure_vpeer_table(&mut tables, &mut rec);
        let recipients = ensure_spike_recipients_table(&mut tables, &mut rec);
        assert_ne!(vpeer, recipients);
    }
}
