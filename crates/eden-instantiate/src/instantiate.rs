//! The Instantiator (§4.4): walks populations, projections, inputs, and data
//! writers against a partitioned model, allocating tables for the local
//! rank's work items and resolving cross-references to either a local packed
//! reference or a remote dependency tracked for [`eden_decomp`].
//!
//! Two classes of remote dependency are resolved at very different times:
//!
//! * **Voltage-peer and data-writer references** only need *our own* recv
//!   list to resolve — as soon as we know we must receive peer `X`'s data,
//!   we can size our own value mirror for `X` and point the placeholder at
//!   it. [`instantiate`] does this inline, before returning.
//! * **Spike-recipient references** need the *peer's* recv list (how many
//!   spike sources does peer `X` want from us), which only exists after the
//!   cross-rank recv-list exchange (§4.5) completes. [`instantiate`] leaves
//!   these as placeholders in [`InstantiationResult::pending_spike_recipients`];
//!   call [`finalize_spike_recipients`] once `send_lists` are available.

use std::collections::HashMap;

use eden_decomp::{decompose, value_mirror_len, RankPartition, RecvList, RemoteRef, SendList};
use eden_model::{InputKind, Model, PointOnCell, SimulatorConfig};
use eden_sig::WorkItemSignature;
use eden_tables::{PackedRef, TableId, Tables};

use crate::error::{InstantiateError, Result};
use crate::gid::{self, population_offsets};
use crate::layout::{self, InstanceRecord};
use crate::seed::mix_seed;

/// Resting potential new compartments are initialized to. The model's data
/// types carry no per-cell-type `v0`; the Instantiator supplies one uniform
/// default, matching the single passive compartment scenario's `V0 = -70 mV`.
const DEFAULT_RESTING_POTENTIAL_MV: f32 = -70.0;

/// Reserved table index aliasing `global_constants` (distinct from any real
/// `const_i64`/`const_f32` table id, which are allocated starting at 0).
const GLOBAL_CONST_TABREF: u32 = u32::MAX - 1;
/// Reserved table index aliasing `global_initial_state`/the state buffers.
const GLOBAL_STATE_TABREF: u32 = u32::MAX - 2;

/// Which half of a value-mirror slot range a pending placeholder belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MirrorKind {
    VoltagePeer,
    DataWriter,
}

/// A placeholder written during instantiation that must be patched once its
/// peer's value mirror exists (§4.5 "Mirror buffers").
#[derive(Debug, Clone)]
struct PendingValueMirrorRef {
    table: TableId,
    entry: u32,
    peer: u32,
    kind: MirrorKind,
    local_index: u32,
}

/// A spike-recipient placeholder awaiting the cross-rank exchange to learn
/// its slot in this rank's outgoing spike mirror for `peer`.
#[derive(Debug, Clone)]
pub struct PendingSpikeRecipient {
    table: TableId,
    entry: u32,
    /// The rank that owns the post-synaptic compartment this spike targets.
    pub peer: u32,
}

/// Where a trajectory logger column reads its value from at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// A scalar state index into `global_initial_state`/the state buffers,
    /// on this rank.
    Local {
        /// Index into the flat scalar state vector.
        index: u32,
    },
    /// A slot in the value mirror received from a remote peer.
    Remote {
        /// The value-mirror table to read from.
        table: TableId,
        /// Slot within that table.
        index: u32,
    },
}

/// One resolved trajectory logger column (§4.4 "Data writer column").
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    /// Owning data writer id.
    pub writer_id: u32,
    /// Column id within the writer (its position in declaration order).
    pub column_id: u32,
    /// Scale factor to convert engine-native units to the requested units.
    pub scale_factor: f32,
    /// Where to read the value from.
    pub source: ColumnSource,
}

/// Everything the Instantiator produced for this rank.
pub struct InstantiationResult {
    /// The populated flat data plane.
    pub tables: Tables,
    /// Per-instance bookkeeping, indexed by global neuron id; `None` for
    /// instances not owned by this rank.
    pub records: Vec<Option<InstanceRecord>>,
    /// This rank's recv lists, ready for [`eden_decomp::exchange_recv_lists`].
    pub recv_lists: HashMap<u32, RecvList>,
    /// Spike-recipient placeholders awaiting [`finalize_spike_recipients`].
    pub pending_spike_recipients: Vec<PendingSpikeRecipient>,
    /// Resolved trajectory logger columns.
    pub columns: Vec<ResolvedColumn>,
    /// This rank's partition of the global id space.
    pub partition: RankPartition,
    /// Each cell type's abstract layout, by cell type id; the kernel emitter
    /// (§4.3) walks the same signatures to generate `doit` bodies.
    pub signatures: HashMap<u32, WorkItemSignature>,
    /// This rank's incoming value mirror table per peer rank, sized by
    /// [`eden_decomp::value_mirror_len`] and scattered into during the Recv
    /// phase (§4.6 step 2).
    pub value_mirrors: HashMap<u32, TableId>,
    /// For each peer this rank receives spikes from, the local `(trigger
    /// table, entry)` to set for each position in that peer's spike-index
    /// wire order (§4.6 step 2, "set the referenced trigger entry ... across
    /// every local destination").
    pub remote_spike_triggers: HashMap<u32, Vec<(TableId, u32)>>,
}

/// Instantiate `model` for `local_rank` out of `rank_count` ranks.
pub fn instantiate(model: &Model, config: &SimulatorConfig, local_rank: u32, rank_count: u32) -> Result<InstantiationResult> {
    model.validate()?;

    let total = model.total_neurons();
    let partitions = decompose(total, rank_count)?;
    let my_partition = partitions[local_rank as usize].clone();
    let offsets = population_offsets(model);
    let base_seed = config.rng_seed.unwrap_or(0);

    let mut tables = Tables::new();
    tables.global_const_tabref = TableId::new(GLOBAL_CONST_TABREF);
    tables.global_state_tabref = TableId::new(GLOBAL_STATE_TABREF);

    let mut records: Vec<Option<InstanceRecord>> = vec![None; total as usize];
    let signatures: HashMap<u32, WorkItemSignature> = model.cell_types.iter().map(|c| (c.id, WorkItemSignature::build(c))).collect();

    instantiate_populations(model, &offsets, &my_partition, base_seed, &mut tables, &mut records)?;
    instantiate_inputs(model, &offsets, &my_partition, &mut tables, &mut records)?;

    let mut recv_lists: HashMap<u32, RecvList> = HashMap::new();
    let mut pending_vpeer: Vec<PendingValueMirrorRef> = Vec::new();
    let mut pending_spike_recipients: Vec<PendingSpikeRecipient> = Vec::new();
    let mut unresolved_columns: Vec<(ResolvedColumn, Option<(u32, u32)>)> = Vec::new();
    let mut remote_spike_triggers: HashMap<u32, Vec<(TableId, u32)>> = HashMap::new();

    instantiate_projections(
        model,
        &offsets,
        &partitions,
        local_rank,
        &mut tables,
        &mut records,
        &mut recv_lists,
        &mut pending_vpeer,
        &mut pending_spike_recipients,
        &mut remote_spike_triggers,
    )?;

    resolve_data_writers(model, &offsets, &partitions, local_rank, &records, &mut recv_lists, &mut unresolved_columns)?;

    let value_mirrors = allocate_value_mirrors(&mut tables, &recv_lists)?;
    patch_value_mirror_placeholders(&mut tables, &pending_vpeer, &recv_lists, &value_mirrors);
    let columns = resolve_column_mirrors(unresolved_columns, &recv_lists, &value_mirrors);

    Ok(InstantiationResult {
        tables,
        records,
        recv_lists,
        pending_spike_recipients,
        columns,
        partition: my_partition,
        signatures,
        value_mirrors,
        remote_spike_triggers,
    })
}

fn instantiate_populations(
    model: &Model,
    offsets: &[u32],
    my_partition: &RankPartition,
    base_seed: u64,
    tables: &mut Tables,
    records: &mut [Option<InstanceRecord>],
) -> Result<()> {
    for (pop_index, pop) in model.populations.iter().enumerate() {
        let Some(cell_type) = model.cell_types.iter().find(|c| c.id == pop.cell_type) else {
            return Err(InstantiateError::UnknownCellType { population: pop.id, cell_type: pop.cell_type });
        };
        let base = offsets[pop_index];
        for instance in 0..pop.size {
            let gid = base + instance;
            if !my_partition.owns(gid) {
                continue;
            }
            let work_item = tables.begin_work_item();
            let rng_seed_index = tables.append_scalar_constant(mix_seed(base_seed, gid));
            // One scalar state per segment (voltage), then one more per gate
            // (`CellType::gate_state_count`), in that fixed order — the
            // Kernel Emitter computes the same split independently via
            // `CellType::gate_scalar_slot`.
            let voltage_indices: Vec<u32> =
                (0..cell_type.segment_count).map(|_| tables.append_scalar_state(DEFAULT_RESTING_POTENTIAL_MV)).collect();
            for _ in 0..cell_type.gate_state_count() {
                tables.append_scalar_state(0.0);
            }
            let mut rec = InstanceRecord::new(work_item, rng_seed_index, voltage_indices);
            // Eagerly claim fixed table ordinals in this work item's slice so
            // the emitted kernel can address them generically regardless of
            // whether this particular instance ends up using them (§4.3.5,
            // §4.4): pulse inputs at `const_f32` ordinal 0, spike-list inputs
            // at ordinal 1, spike recipients at `const_i64` ordinal 0. Each
            // ensure_* call is idempotent, so instantiate_inputs re-fetching
            // the same table later is a no-op.
            layout::ensure_pulse_table(tables, &mut rec);
            layout::ensure_spike_list_table(tables, &mut rec);
            layout::ensure_spike_recipients_table(tables, &mut rec);
            records[gid as usize] = Some(rec);
        }
    }
    Ok(())
}

fn instantiate_inputs(
    model: &Model,
    offsets: &[u32],
    my_partition: &RankPartition,
    tables: &mut Tables,
    records: &mut [Option<InstanceRecord>],
) -> Result<()> {
    for input in &model.inputs {
        let gid = gid::global_id(model, offsets, input.target.population, input.target.cell_instance)?;
        if !my_partition.owns(gid) {
            continue;
        }
        let rec = records[gid as usize].as_mut().expect("owned gid must have a record");
        match &input.kind {
            InputKind::Pulse { amplitude_na, start_ms, duration_ms } => {
                // Fourth entry is the target segment, so the emitted kernel
                // can add this pulse's current into the right element of its
                // per-segment `i_internal` array without the signature
                // needing a separate per-segment pulse table.
                let t = layout::ensure_pulse_table(tables, rec);
                tables.push_entry_const_f32(t, *amplitude_na)?;
                tables.push_entry_const_f32(t, *start_ms)?;
                tables.push_entry_const_f32(t, *duration_ms)?;
                tables.push_entry_const_f32(t, input.target.segment as f32)?;
            }
            InputKind::SpikeList { times_ms } => {
                let t = layout::ensure_spike_list_table(tables, rec);
                for &time in times_ms {
                    tables.push_entry_const_f32(t, time)?;
                }
                tables.push_entry_const_f32(t, f32::INFINITY)?;
            }
            InputKind::Component { parameters, .. } => {
                let t = layout::ensure_component_table(tables, rec);
                for (_, value) in parameters {
                    tables.push_entry_const_f32(t, *value)?;
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn instantiate_projections(
    model: &Model,
    offsets: &[u32],
    partitions: &[RankPartition],
    local_rank: u32,
    tables: &mut Tables,
    records: &mut [Option<InstanceRecord>],
    recv_lists: &mut HashMap<u32, RecvList>,
    pending_vpeer: &mut Vec<PendingValueMirrorRef>,
    pending_spike_recipients: &mut Vec<PendingSpikeRecipient>,
    remote_spike_triggers: &mut HashMap<u32, Vec<(TableId, u32)>>,
) -> Result<()> {
    let my_partition = &partitions[local_rank as usize];
    for proj in &model.projections {
        for conn in &proj.connections {
            let pre_gid = gid::global_id(model, offsets, conn.pre.population, conn.pre.cell_instance)?;
            let post_gid = gid::global_id(model, offsets, conn.post.population, conn.post.cell_instance)?;
            let pre_owner = eden_decomp::owning_rank(partitions, pre_gid).expect("partition covers every gid");
            let post_owner = eden_decomp::owning_rank(partitions, post_gid).expect("partition covers every gid");

            if proj.is_spiking {
                resolve_spike_connection(
                    tables,
                    records,
                    my_partition,
                    local_rank,
                    pre_gid,
                    post_gid,
                    conn.pre,
                    post_owner,
                    pre_owner,
                    recv_lists,
                    pending_spike_recipients,
                    remote_spike_triggers,
                )?;
            } else {
                resolve_vpeer_side(tables, records, my_partition, local_rank, pre_gid, post_gid, conn.post, post_owner, recv_lists, pending_vpeer)?;
                resolve_vpeer_side(tables, records, my_partition, local_rank, post_gid, pre_gid, conn.pre, pre_owner, recv_lists, pending_vpeer)?;
            }
        }
    }
    Ok(())
}

/// Resolve one side of a gap-junction endpoint: `this_gid` needs a packed
/// reference to `other_gid`'s voltage at `other_point`.
#[allow(clippy::too_many_arguments)]
fn resolve_vpeer_side(
    tables: &mut Tables,
    records: &mut [Option<InstanceRecord>],
    my_partition: &RankPartition,
    local_rank: u32,
    this_gid: u32,
    other_gid: u32,
    other_point: PointOnCell,
    other_owner: u32,
    recv_lists: &mut HashMap<u32, RecvList>,
    pending: &mut Vec<PendingValueMirrorRef>,
) -> Result<()> {
    if !my_partition.owns(this_gid) {
        return Ok(());
    }
    let packed_value: i64 = if other_owner == local_rank {
        let other_rec = records[other_gid as usize].as_ref().expect("local gid must have a record");
        let voltage_index = other_rec.voltage_indices[other_point.segment as usize];
        PackedRef::new(tables.global_state_tabref.raw() as u64, voltage_index as u64).encode() as i64
    } else {
        0
    };
    let rec = records[this_gid as usize].as_mut().expect("local gid must have a record");
    let table = layout::ensure_vpeer_table(tables, rec);
    let entry = tables.push_entry_const_i64(table, packed_value)?;
    if other_owner != local_rank {
        let local_index = recv_lists.entry(other_owner).or_insert_with(|| RecvList::new(other_owner)).push(RemoteRef::VoltagePeer(other_point));
        pending.push(PendingValueMirrorRef { table, entry, peer: other_owner, kind: MirrorKind::VoltagePeer, local_index });
    }
    Ok(())
}

/// Resolve one spiking connection: if the post-synaptic side is local,
/// allocate its trigger slot first; then, if the pre-synaptic side is local,
/// record the packed reference (direct if post is also local, a pending
/// placeholder otherwise). If post is local but pre is remote, register the
/// spike-source dependency on `pre_owner`'s recv list and remember which
/// local trigger slot the engine must set once that position's spike index
/// comes back from `pre_owner` (§4.6 Recv phase).
#[allow(clippy::too_many_arguments)]
fn resolve_spike_connection(
    tables: &mut Tables,
    records: &mut [Option<InstanceRecord>],
    my_partition: &RankPartition,
    local_rank: u32,
    pre_gid: u32,
    post_gid: u32,
    pre_point: PointOnCell,
    post_owner: u32,
    pre_owner: u32,
    recv_lists: &mut HashMap<u32, RecvList>,
    pending_spike_recipients: &mut Vec<PendingSpikeRecipient>,
    remote_spike_triggers: &mut HashMap<u32, Vec<(TableId, u32)>>,
) -> Result<()> {
    let post_trigger_location = if my_partition.owns(post_gid) {
        let rec = records[post_gid as usize].as_mut().expect("local gid must have a record");
        let table = layout::ensure_trigger_table(tables, rec);
        let entry = tables.push_entry_state_i64(table, 0)?;
        Some((table, entry))
    } else {
        None
    };

    if my_partition.owns(pre_gid) {
        let rec = records[pre_gid as usize].as_mut().expect("local gid must have a record");
        let table = layout::ensure_spike_recipients_table(tables, rec);
        let packed_value: i64 = match post_trigger_location {
            Some((ttable, tentry)) => PackedRef::new(ttable.raw() as u64, tentry as u64).encode() as i64,
            None => 0,
        };
        let entry = tables.push_entry_const_i64(table, packed_value)?;
        if post_owner != local_rank {
            pending_spike_recipients.push(PendingSpikeRecipient { table, entry, peer: post_owner });
        }
    }

    if my_partition.owns(post_gid) && pre_owner != local_rank {
        recv_lists.entry(pre_owner).or_insert_with(|| RecvList::new(pre_owner)).push(RemoteRef::SpikeSource(pre_point));
        let (table, entry) = post_trigger_location.expect("post is local in this branch");
        remote_spike_triggers.entry(pre_owner).or_default().push((table, entry));
    }

    Ok(())
}

fn resolve_data_writers(
    model: &Model,
    offsets: &[u32],
    partitions: &[RankPartition],
    local_rank: u32,
    records: &[Option<InstanceRecord>],
    recv_lists: &mut HashMap<u32, RecvList>,
    unresolved: &mut Vec<(ResolvedColumn, Option<(u32, u32)>)>,
) -> Result<()> {
    for writer in &model.data_writers {
        for (column_index, col) in writer.columns.iter().enumerate() {
            let column_id = column_index as u32;
            let gid = gid::global_id(model, offsets, col.source.population, col.source.cell_instance)?;
            let owner = eden_decomp::owning_rank(partitions, gid).expect("partition covers every gid");
            if owner == local_rank {
                let rec = records[gid as usize].as_ref().expect("local gid must have a record");
                let index = rec.voltage_indices[col.source.segment as usize];
                unresolved.push((
                    ResolvedColumn { writer_id: writer.id, column_id, scale_factor: col.scale_factor, source: ColumnSource::Local { index } },
                    None,
                ));
            } else {
                let local_index = recv_lists
                    .entry(owner)
                    .or_insert_with(|| RecvList::new(owner))
                    .push(RemoteRef::DataWriter(eden_model::DataWriterColumn { writer_id: writer.id, column_id }));
                unresolved.push((
                    ResolvedColumn {
                        writer_id: writer.id,
                        column_id,
                        scale_factor: col.scale_factor,
                        source: ColumnSource::Remote { table: TableId::UNASSIGNED, index: 0 },
                    },
                    Some((owner, local_index)),
                ));
            }
        }
    }
    Ok(())
}

fn allocate_value_mirrors(tables: &mut Tables, recv_lists: &HashMap<u32, RecvList>) -> Result<HashMap<u32, TableId>> {
    let mut mirrors = HashMap::new();
    for (&peer, recv_list) in recv_lists {
        let len = value_mirror_len(recv_list);
        let table = tables.append_table_state_f32();
        for _ in 0..len {
            tables.push_entry_state_f32(table, 0.0)?;
        }
        mirrors.insert(peer, table);
    }
    Ok(mirrors)
}

fn patch_value_mirror_placeholders(
    tables: &mut Tables,
    pending: &[PendingValueMirrorRef],
    recv_lists: &HashMap<u32, RecvList>,
    value_mirrors: &HashMap<u32, TableId>,
) {
    for p in pending {
        let recv_list = &recv_lists[&p.peer];
        let slot = match p.kind {
            MirrorKind::VoltagePeer => p.local_index,
            MirrorKind::DataWriter => recv_list.vpeer_count() + p.local_index,
        };
        let mirror_table = value_mirrors[&p.peer];
        let packed = PackedRef::new(mirror_table.raw() as u64, slot as u64).encode() as i64;
        tables.const_i64[p.table.raw() as usize][p.entry as usize] = packed;
    }
}

fn resolve_column_mirrors(
    unresolved: Vec<(ResolvedColumn, Option<(u32, u32)>)>,
    recv_lists: &HashMap<u32, RecvList>,
    value_mirrors: &HashMap<u32, TableId>,
) -> Vec<ResolvedColumn> {
    unresolved
        .into_iter()
        .map(|(mut col, remote)| {
            if let Some((peer, local_index)) = remote {
                let recv_list = &recv_lists[&peer];
                let slot = recv_list.vpeer_count() + local_index;
                col.source = ColumnSource::Remote { table: value_mirrors[&peer], index: slot };
            }
            col
        })
        .collect()
}

/// Allocate one `state_i64` "spike mirror" table per peer this rank must
/// send spikes to, and patch every pending spike-recipient placeholder to
/// point into it. `pending`'s encounter order for a given peer corresponds,
/// position for position, to that peer's `SpikeSource`-filtered recv-list
/// order: both ranks walk the identical global `projections` list and filter
/// on the same (symmetric) ownership condition, so the k-th match on one
/// side is the k-th match on the other (see DESIGN.md).
pub fn finalize_spike_recipients(
    tables: &mut Tables,
    pending: &[PendingSpikeRecipient],
    send_lists: &HashMap<u32, SendList>,
) -> Result<HashMap<u32, TableId>> {
    let mut order: Vec<u32> = Vec::new();
    let mut by_peer: HashMap<u32, Vec<&PendingSpikeRecipient>> = HashMap::new();
    for p in pending {
        by_peer.entry(p.peer).or_insert_with(|| {
            order.push(p.peer);
            Vec::new()
        }).push(p);
    }

    let mut spike_mirrors = HashMap::new();
    for peer in order {
        let items = &by_peer[&peer];
        let mirror_table = tables.append_table_state_i64();
        for (i, item) in items.iter().enumerate() {
            let entry = tables.push_entry_state_i64(mirror_table, 0)?;
            debug_assert_eq!(entry, i as u32);
            let packed = PackedRef::new(mirror_table.raw() as u64, entry as u64).encode() as i64;
            tables.const_i64[item.table.raw() as usize][item.entry as usize] = packed;
        }
        if let Some(sl) = send_lists.get(&peer) {
            debug_assert_eq!(sl.spike_source_count() as usize, items.len());
        }
        spike_mirrors.insert(peer, mirror_table);
    }
    Ok(spike_mirrors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eden_model::{CellType, Connection, DataWriter, DataWriterColumnSpec, Input, Population, Projection};

    fn passive_cell_type() -> CellType {
        CellType {
            id: 0,
            name: "passive".to_string(),
            segment_count: 1,
            segment_parent: vec![0],
            capacitance_nf: vec![1.0],
            axial_resistance_mohm: vec![0.0],
            channel_distributions: vec![],
            has_spike_threshold: true,
            spike_threshold_mv: -20.0,
        }
    }

    #[test]
    fn single_rank_population_gets_all_instances() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 4 }],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        assert_eq!(result.tables.work_item_count(), 4);
        assert!(result.records.iter().all(|r| r.is_some()));
    }

    #[test]
    fn rng_seeds_differ_across_instances() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 2 }],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        let seed0 = result.tables.global_constants[result.records[0].as_ref().unwrap().rng_seed_index as usize];
        let seed1 = result.tables.global_constants[result.records[1].as_ref().unwrap().rng_seed_index as usize];
        assert_ne!(seed0.to_bits(), seed1.to_bits());
    }

    #[test]
    fn two_rank_partition_only_instantiates_owned_gids() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 4 }],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![],
        };
        let rank0 = instantiate(&model, &SimulatorConfig::default(), 0, 2).unwrap();
        let rank1 = instantiate(&model, &SimulatorConfig::default(), 1, 2).unwrap();
        assert_eq!(rank0.records.iter().filter(|r| r.is_some()).count(), 2);
        assert_eq!(rank1.records.iter().filter(|r| r.is_some()).count(), 2);
    }

    #[test]
    fn local_gap_junction_resolves_to_a_direct_packed_reference() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 2 }],
            projections: vec![Projection {
                name: "gap".to_string(),
                pre_population: 0,
                post_population: 0,
                is_spiking: false,
                kinetics: eden_model::SynapseKinetics::GapJunction { conductance_us: 0.05 },
                connections: vec![Connection {
                    pre: PointOnCell::new(0, 0, 0, 0.5),
                    post: PointOnCell::new(0, 1, 0, 0.5),
                    weight: 1.0,
                    delay_ms: 0.0,
                }],
            }],
            inputs: vec![],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        assert!(result.recv_lists.is_empty(), "single-rank run has no remote dependencies");
        let pre_rec = result.records[0].as_ref().unwrap();
        let vpeer_table = pre_rec.vpeer_table.expect("pre side should have a vpeer table");
        let packed = PackedRef::decode(result.tables.const_i64[vpeer_table.raw() as usize][0] as u64);
        assert_eq!(packed.table, result.tables.global_state_tabref.raw() as u64);
        let post_rec = result.records[1].as_ref().unwrap();
        assert_eq!(packed.entry as u32, post_rec.voltage_indices[0]);
    }

    #[test]
    fn local_spiking_connection_wires_trigger_directly() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 2 }],
            projections: vec![Projection {
                name: "syn".to_string(),
                pre_population: 0,
                post_population: 0,
                is_spiking: true,
                kinetics: eden_model::SynapseKinetics::Exponential { gbase_us: 0.001, tau_ms: 2.0, erev_mv: 0.0 },
                connections: vec![Connection {
                    pre: PointOnCell::new(0, 0, 0, 0.5),
                    post: PointOnCell::new(0, 1, 0, 0.5),
                    weight: 1.0,
                    delay_ms: 2.0,
                }],
            }],
            inputs: vec![],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        let pre_rec = result.records[0].as_ref().unwrap();
        let recipients_table = pre_rec.spike_recipients_table.expect("pre side should have spike recipients");
        let packed = PackedRef::decode(result.tables.const_i64[recipients_table.raw() as usize][0] as u64);
        let post_rec = result.records[1].as_ref().unwrap();
        assert_eq!(packed.table, post_rec.trigger_table.unwrap().raw() as u64);
        assert!(result.pending_spike_recipients.is_empty());
    }

    #[test]
    fn spike_recipients_table_is_always_local_const_i64_ordinal_zero() {
        // The emitted kernel (§4.3.5) reads its spike-recipients count and
        // pointer at the work item's own `table_const_i64_work_offset` with
        // no extra index threaded through the signature; that only works if
        // every spike-threshold cell type claims the table eagerly as the
        // first const_i64 table of its slice, before any projection can
        // allocate a vpeer table ahead of it.
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 3 }],
            projections: vec![
                Projection {
                    name: "gap".to_string(),
                    pre_population: 0,
                    post_population: 0,
                    is_spiking: false,
                    kinetics: eden_model::SynapseKinetics::GapJunction { conductance_us: 0.05 },
                    connections: vec![Connection {
                        pre: PointOnCell::new(0, 0, 0, 0.5),
                        post: PointOnCell::new(0, 2, 0, 0.5),
                        weight: 1.0,
                        delay_ms: 0.0,
                    }],
                },
                Projection {
                    name: "syn".to_string(),
                    pre_population: 0,
                    post_population: 0,
                    is_spiking: true,
                    kinetics: eden_model::SynapseKinetics::Exponential { gbase_us: 0.001, tau_ms: 2.0, erev_mv: 0.0 },
                    connections: vec![Connection {
                        pre: PointOnCell::new(0, 0, 0, 0.5),
                        post: PointOnCell::new(0, 1, 0, 0.5),
                        weight: 1.0,
                        delay_ms: 2.0,
                    }],
                },
            ],
            inputs: vec![],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        // gid 0 is pre-synaptic on both a gap junction (allocates a vpeer
        // table) and a spiking connection; its spike-recipients table must
        // still sit at ordinal 0 of its own const_i64 slice.
        let rec0 = result.records[0].as_ref().unwrap();
        let offsets = result.tables.work_item_offsets(rec0.work_item).unwrap();
        let recipients = rec0.spike_recipients_table.expect("spike threshold cell must have a recipients table");
        assert_eq!(recipients.raw(), offsets.table_const_i64_start);
        // gid 1 receives no outgoing connections but still gets a
        // (possibly empty) recipients table at the same fixed ordinal.
        let rec1 = result.records[1].as_ref().unwrap();
        let offsets1 = result.tables.work_item_offsets(rec1.work_item).unwrap();
        let recipients1 = rec1.spike_recipients_table.expect("every spike threshold cell gets a recipients table");
        assert_eq!(recipients1.raw(), offsets1.table_const_i64_start);
        assert!(result.tables.const_i64[recipients1.raw() as usize].is_empty());
    }

    #[test]
    fn pulse_input_populates_four_entries_including_target_segment() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 1 }],
            projections: vec![],
            inputs: vec![Input {
                target: PointOnCell::new(0, 0, 0, 0.5),
                kind: InputKind::Pulse { amplitude_na: 0.1, start_ms: 10.0, duration_ms: 50.0 },
            }],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        let rec = result.records[0].as_ref().unwrap();
        let table = rec.pulse_table.unwrap();
        assert_eq!(result.tables.const_f32[table.raw() as usize], vec![0.1, 10.0, 50.0, 0.0]);
    }

    #[test]
    fn pulse_and_spike_list_tables_are_always_allocated_at_fixed_const_f32_ordinals() {
        // Every instance gets a pulse table at ordinal 0 and a spike-list
        // table at ordinal 1 of its own const_f32 slice, even when no Input
        // targets it, so the emitted kernel can address both generically.
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 1 }],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        let rec = result.records[0].as_ref().unwrap();
        let offsets = result.tables.work_item_offsets(rec.work_item).unwrap();
        let pulse = rec.pulse_table.expect("pulse table always allocated");
        let spike_list = rec.spike_list_table.expect("spike-list table always allocated");
        assert_eq!(pulse.raw(), offsets.table_const_f32_start);
        assert_eq!(spike_list.raw(), offsets.table_const_f32_start + 1);
        assert!(result.tables.const_f32[pulse.raw() as usize].is_empty());
        assert!(result.tables.const_f32[spike_list.raw() as usize].is_empty());
    }

    #[test]
    fn spike_list_input_appends_infinity_sentinel() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 1 }],
            projections: vec![],
            inputs: vec![Input {
                target: PointOnCell::new(0, 0, 0, 0.5),
                kind: InputKind::SpikeList { times_ms: vec![10.0, 20.0, 30.0] },
            }],
            data_writers: vec![],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        let rec = result.records[0].as_ref().unwrap();
        let table = rec.spike_list_table.unwrap();
        let entries = &result.tables.const_f32[table.raw() as usize];
        assert_eq!(entries.len(), 4);
        assert!(entries.last().unwrap().is_infinite());
    }

    #[test]
    fn local_data_writer_column_resolves_to_the_source_voltage_index() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 1 }],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![DataWriter {
                id: 0,
                path: "out.dat".to_string(),
                columns: vec![DataWriterColumnSpec { source: PointOnCell::new(0, 0, 0, 0.5), scale_factor: 1.0 }],
            }],
        };
        let result = instantiate(&model, &SimulatorConfig::default(), 0, 1).unwrap();
        let rec = result.records[0].as_ref().unwrap();
        assert_eq!(result.columns.len(), 1);
        match result.columns[0].source {
            ColumnSource::Local { index } => assert_eq!(index, rec.voltage_indices[0]),
            ColumnSource::Remote { .. } => panic!("expected a local column"),
        }
    }

    #[test]
    fn cross_rank_gap_junction_leaves_a_recv_list_entry_and_a_value_mirror() {
        let model = Model {
            cell_types: vec![passive_cell_type()],
            populations: vec![Population { id: 0, name: "p".to_string(), cell_type: 0, size: 2 }],
            projections: vec![Projection {
                name: "gap".to_string(),
                pre_population: 0,
                post_population: 0,
                is_spiking: false,
                kinetics: eden_model::SynapseKinetics::GapJunction { conductance_us: 0.05 },
                connections: vec![Connection {
                    pre: PointOnCell::new(0, 0, 0, 0.5),
                    post: PointOnCell::new(0, 1, 0, 0.5),
                    weight: 1.0,
                    delay_ms: 0.0,
                }],
            }],
            inputs: vec![],
            data_writers: vec![],
        };
        // gid 0 on rank 0, gid 1 on rank 1.
        let rank0 = instantiate(&model, &SimulatorConfig::default(), 0, 2).unwrap();
        assert!(rank0.recv_lists.contains_key(&1));
        assert_eq!(rank0.recv_lists[&1].vpeer_count(), 1);

        let rec0 = rank0.records[0].as_ref().unwrap();
        let vpeer_table = rec0.vpeer_table.unwrap();
        let packed = PackedRef::decode(rank0.tables.const_i64[vpeer_table.raw() as usize][0] as u64);
        // Not the flat scalar alias: it must point into a real value-mirror table.
        assert_ne!(packed.table, rank0.tables.global_state_tabref.raw() as u64);
    }
}
