//! Per-rank simulation state and the six-phase step loop (§4.6).
//!
//! One [`RankState`] owns a single rank's slice of the flat data plane plus
//! everything the step loop needs to drive it: the engine-owned scalar
//! double buffer (not part of [`Tables`], see the module-level note below),
//! the exchanged recv/send lists, the value and spike mirror tables, the
//! per-work-item cell type map, its transport handle, and its open
//! trajectory loggers.
//!
//! [`Tables`] only stores `global_initial_state`, a single seed vector for
//! the scalar state — not a live "now"/"next" pair. The engine owns that
//! pair itself (`scalar_now`/`scalar_next`) and swaps it in lockstep with
//! [`Tables::swap_buffers`] during the Swap phase.

use std::collections::HashMap;

use eden_codegen::LoadedKernel;
use eden_decomp::{pack_step_payload, payload_from_bytes, payload_to_bytes, unpack_step_payload, RankPartition, RecvList, RemoteRef, SendList, Transport, WIRE_TAG};
use eden_instantiate::{gid, InstanceRecord, InstantiationResult};
use eden_model::{Model, PointOnCell};
use eden_tables::{TableId, Tables};

use crate::dispatch::compute_step;
use crate::error::{EngineError, Result};
use crate::trajectory::TrajectoryLogger;

/// Bound on spin-poll rounds per peer in the Recv phase before giving up;
/// with a loopback transport delivery is immediate, so this only guards
/// against a genuinely missing peer (a bug elsewhere, not real network jitter).
const MAX_RECV_ROUNDS: usize = 10_000;

/// One rank's complete simulation state.
pub struct RankState<'m, T: Transport> {
    model: &'m Model,
    offsets: Vec<u32>,
    transport: T,
    tables: Tables,
    scalar_now: Vec<f32>,
    scalar_next: Vec<f32>,
    records: Vec<Option<InstanceRecord>>,
    recv_lists: HashMap<u32, RecvList>,
    send_lists: HashMap<u32, SendList>,
    value_mirrors: HashMap<u32, TableId>,
    spike_mirrors: HashMap<u32, TableId>,
    remote_spike_triggers: HashMap<u32, Vec<(TableId, u32)>>,
    work_item_cell_type: Vec<u32>,
    loggers: Vec<TrajectoryLogger>,
}

impl<'m, T: Transport> RankState<'m, T> {
    /// Assemble one rank's state from its [`InstantiationResult`] and the
    /// send lists the recv-list exchange assigned it. Allocates the spike
    /// mirror tables, derives the per-work-item cell type map, and opens
    /// this rank's trajectory loggers.
    pub fn new(
        model: &'m Model,
        offsets: Vec<u32>,
        transport: T,
        mut result: InstantiationResult,
        send_lists: HashMap<u32, SendList>,
        log_dir: &std::path::Path,
    ) -> Result<Self> {
        let spike_mirrors = eden_instantiate::finalize_spike_recipients(&mut result.tables, &result.pending_spike_recipients, &send_lists)?;

        let work_item_cell_type = work_item_cell_types(model, &offsets, &result.partition, &result.records, result.tables.work_item_count());

        let rank = transport.rank();
        let loggers = model
            .data_writers
            .iter()
            .map(|w| {
                let path = crate::trajectory::rank_scoped_path(log_dir, rank, &w.path);
                if let Some(parent) = std::path::Path::new(&path).parent() {
                    std::fs::create_dir_all(parent).map_err(|e| EngineError::TrajectoryIo { path: path.clone(), source: e })?;
                }
                TrajectoryLogger::open(w.id, &path, &result.columns)
            })
            .collect::<Result<Vec<_>>>()?;

        let scalar_now = result.tables.global_initial_state.clone();
        let scalar_next = result.tables.global_initial_state.clone();

        Ok(Self {
            model,
            offsets,
            transport,
            tables: result.tables,
            scalar_now,
            scalar_next,
            records: result.records,
            recv_lists: result.recv_lists,
            send_lists,
            value_mirrors: result.value_mirrors,
            spike_mirrors,
            remote_spike_triggers: result.remote_spike_triggers,
            work_item_cell_type,
            loggers,
        })
    }

    /// Send phase (§4.6 step 1): gather every peer's requested values and
    /// pending spikes and hand them to the transport.
    pub fn send_phase(&mut self) -> Result<()> {
        let peers: Vec<u32> = self.send_lists.keys().copied().collect();
        for peer in peers {
            let send_list = &self.send_lists[&peer];
            let mut vpeer_values = Vec::with_capacity(send_list.vpeer_count() as usize);
            let mut daw_values = Vec::with_capacity(send_list.data_writer_count() as usize);
            for entry in &send_list.entries {
                match entry.item {
                    RemoteRef::VoltagePeer(point) => vpeer_values.push(self.gather_value(point)?),
                    RemoteRef::DataWriter(col) => {
                        let point = writer_column_source(self.model, col.writer_id, col.column_id)?;
                        daw_values.push(self.gather_value(point)?);
                    }
                    RemoteRef::SpikeSource(_) => {}
                }
            }
            let spike_indices = self.drain_spike_mirror(peer);
            let payload = pack_step_payload(&vpeer_values, &daw_values, &spike_indices);
            self.transport.send(peer, WIRE_TAG, payload_to_bytes(&payload))?;
        }
        Ok(())
    }

    /// Recv phase (§4.6 step 2): spin-poll every peer in the recv list,
    /// scatter arriving voltages into the value mirror, and set the local
    /// trigger entries named by each arriving spike index.
    pub fn recv_phase(&mut self) -> Result<()> {
        let peers: Vec<u32> = self.recv_lists.keys().copied().collect();
        for peer in peers {
            let recv_list = self.recv_lists[&peer].clone();
            let mut rounds = 0;
            let bytes = loop {
                if let Some(bytes) = self.transport.try_recv_from(peer, WIRE_TAG) {
                    break bytes;
                }
                rounds += 1;
                if rounds >= MAX_RECV_ROUNDS {
                    return Err(EngineError::DidNotConverge { what: format!("recv from peer {peer}"), limit: MAX_RECV_ROUNDS });
                }
            };
            let payload = payload_from_bytes(&bytes).ok_or(EngineError::MalformedPayload { peer })?;
            let (vpeer, daw, spikes) = unpack_step_payload(
                &payload,
                recv_list.vpeer_count() as usize,
                recv_list.data_writer_count() as usize,
                recv_list.spike_source_count() as usize,
            )
            .ok_or(EngineError::MalformedPayload { peer })?;

            let mirror_table = self.value_mirrors[&peer].raw() as usize;
            for (i, &v) in vpeer.iter().chain(daw.iter()).enumerate() {
                self.tables.state_f32_now[mirror_table][i] = v;
            }

            if let Some(triggers) = self.remote_spike_triggers.get(&peer) {
                for spike_index in spikes {
                    if let Some(&(table, entry)) = triggers.get(spike_index as usize) {
                        self.tables.state_i64_now[table.raw() as usize][entry as usize] = 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Compute phase (§4.6 step 3): dispatch every work item to its cell
    /// type's kernel.
    pub fn compute_phase(&mut self, time_ms: f64, dt_ms: f64, step: i64, kernels: &HashMap<u32, LoadedKernel>) -> Result<()> {
        compute_step(time_ms, dt_ms, step, &mut self.tables, &self.scalar_now, &mut self.scalar_next, kernels, &self.work_item_cell_type)
    }

    /// Log phase (§4.6 step 4): write one row per open trajectory logger.
    /// Skipped entirely for initialization steps.
    pub fn log_phase(&mut self, time_s: f64) -> Result<()> {
        for logger in &mut self.loggers {
            logger.write_row(time_s, &self.scalar_now, &self.tables)?;
        }
        Ok(())
    }

    /// Wait phase (§4.6 step 5): complete outstanding sends. A no-op on the
    /// in-process loopback transport, where `send` already completes
    /// synchronously; kept as an explicit phase so a future blocking
    /// transport has a place to hook in.
    pub fn wait_phase(&mut self) -> Result<()> {
        Ok(())
    }

    /// Swap phase (§4.6 step 6): swap the `now`/`next` pointer triples —
    /// the engine-owned scalar buffer alongside every table family
    /// [`Tables::swap_buffers`] already handles.
    pub fn swap_phase(&mut self) {
        std::mem::swap(&mut self.scalar_now, &mut self.scalar_next);
        self.tables.swap_buffers();
    }

    /// Flush every open trajectory logger; called once after the step loop
    /// terminates.
    pub fn finish(&mut self) -> Result<()> {
        for logger in &mut self.loggers {
            logger.flush()?;
        }
        Ok(())
    }

    fn gather_value(&self, point: PointOnCell) -> Result<f32> {
        let gid = gid::global_id(self.model, &self.offsets, point.population, point.cell_instance)?;
        let rec = self.records[gid as usize].as_ref().expect("send list references a locally owned instance");
        let index = rec.voltage_indices[point.segment as usize];
        Ok(self.scalar_now[index as usize])
    }

    fn drain_spike_mirror(&mut self, peer: u32) -> Vec<i32> {
        let Some(&table) = self.spike_mirrors.get(&peer) else {
            return Vec::new();
        };
        let slots = &mut self.tables.state_i64_now[table.raw() as usize];
        let mut fired = Vec::new();
        for (i, slot) in slots.iter_mut().enumerate() {
            if *slot != 0 {
                fired.push(i as i32);
                *slot = 0;
            }
        }
        fired
    }
}

fn writer_column_source(model: &Model, writer_id: u32, column_id: u32) -> Result<PointOnCell> {
    model
        .data_writers
        .iter()
        .find(|w| w.id == writer_id)
        .and_then(|w| w.columns.get(column_id as usize))
        .map(|c| c.source)
        .ok_or_else(|| EngineError::from(eden_instantiate::InstantiateError::UnresolvableColumn { writer: writer_id, column: column_id }))
}

/// Recover each work item's cell type by re-walking populations in the same
/// order the Instantiator created their work items: `records[gid].work_item`
/// values are assigned `0..count` in that same walk order, so the k-th
/// locally-owned instance encountered here owns work item `k`.
fn work_item_cell_types(model: &Model, offsets: &[u32], partition: &RankPartition, records: &[Option<InstanceRecord>], work_item_count: u32) -> Vec<u32> {
    let mut cell_type = vec![0u32; work_item_count as usize];
    for (pop_index, pop) in model.populations.iter().enumerate() {
        let base = offsets[pop_index];
        for instance in 0..pop.size {
            let gid = base + instance;
            if !partition.owns(gid) {
                continue;
            }
            if let Some(rec) = &records[gid as usize] {
                cell_type[rec.work_item.raw() as usize] = pop.cell_type;
            }
        }
    }
    cell_type
}
