//! Time-stepping engine (§4.6).
//!
//! [`run_simulation`] is the single entry point: it instantiates every rank,
//! runs the recv-list exchange, compiles and loads one kernel per cell type,
//! and drives the Send/Recv/Compute/Log/Wait/Swap step loop to completion.
//! Multi-rank runs are simulated in one process over [`eden_decomp::LoopbackTransport`]
//! — there is no real MPI backend, so every rank's phases for a given step
//! run one after another within this same control loop rather than across
//! independent processes.

#![deny(missing_docs)]

pub mod dispatch;
pub mod error;
pub mod rank;
pub mod trajectory;

pub use error::{EngineError, Result};
pub use rank::RankState;

use std::collections::HashMap;
use std::path::Path;

use eden_codegen::{build_all_kernels, CompileOptions};
use eden_decomp::{exchange_recv_lists, LoopbackTransport};
use eden_instantiate::{gid::population_offsets, instantiate};
use eden_model::{CableSolver, Model, SimulatorConfig};
use eden_sig::WorkItemSignature;

/// Number of negative-indexed initialization steps run before `step = 0`
/// (§4.6 "Initialization steps").
const INIT_STEPS: i64 = 3;

/// Build and run a complete simulation: instantiate every rank, exchange
/// recv lists, compile one kernel per cell type, and drive the step loop
/// until `time > t_final`. Trajectory output is written under `log_dir`, one
/// subdirectory per rank; generated kernel sources and shared objects are
/// written under `work_dir`.
pub fn run_simulation(model: &Model, config: &SimulatorConfig, rank_count: u32, work_dir: &Path, log_dir: &Path) -> Result<()> {
    model.validate()?;
    config.validate()?;

    let offsets = population_offsets(model);
    let results = (0..rank_count)
        .map(|rank| instantiate(model, config, rank, rank_count))
        .collect::<eden_instantiate::Result<Vec<_>>>()?;

    let transports = LoopbackTransport::world(rank_count);
    let recv_lists: Vec<_> = results.iter().map(|r| r.recv_lists.clone()).collect();
    let mut send_lists = exchange_recv_lists(&transports, &recv_lists)?;

    let signatures: HashMap<u32, WorkItemSignature> = model.cell_types.iter().map(|c| (c.id, WorkItemSignature::build(c))).collect();
    let compile_options = CompileOptions { cable_solver: cable_solver_kind(config.cable_solver), use_icc: config.use_icc, emit_assembly: config.emit_assembly, ..CompileOptions::default() };
    std::fs::create_dir_all(work_dir).map_err(|e| EngineError::TrajectoryIo { path: work_dir.display().to_string(), source: e })?;
    let kernels = build_all_kernels(model, &signatures, work_dir, &compile_options)?;

    let mut ranks = Vec::with_capacity(rank_count as usize);
    for (rank, result) in results.into_iter().enumerate() {
        let transport = transports[rank].clone();
        let peer_send_lists = std::mem::take(&mut send_lists[rank]);
        ranks.push(RankState::new(model, offsets.clone(), transport, result, peer_send_lists, log_dir)?);
    }

    step_loop(&mut ranks, config, &kernels)?;

    for rank in &mut ranks {
        rank.finish()?;
    }
    Ok(())
}

fn step_loop(ranks: &mut [RankState<'_, LoopbackTransport>], config: &SimulatorConfig, kernels: &HashMap<u32, eden_codegen::LoadedKernel>) -> Result<()> {
    let mut time_ms = config.t_initial;
    let mut step = -INIT_STEPS;

    loop {
        for rank in ranks.iter_mut() {
            rank.send_phase()?;
        }
        for rank in ranks.iter_mut() {
            rank.recv_phase()?;
        }
        for rank in ranks.iter_mut() {
            rank.compute_phase(time_ms as f64, config.dt as f64, step, kernels)?;
        }
        if step >= 0 {
            let time_s = (time_ms as f64) / 1000.0;
            for rank in ranks.iter_mut() {
                rank.log_phase(time_s)?;
            }
        }
        for rank in ranks.iter_mut() {
            rank.wait_phase()?;
        }
        for rank in ranks.iter_mut() {
            rank.swap_phase();
        }

        if step >= 0 {
            time_ms += config.dt;
            if time_ms > config.t_final {
                break;
            }
        }
        step += 1;
    }
    Ok(())
}

fn cable_solver_kind(choice: CableSolver) -> eden_codegen::CableSolverKind {
    match choice {
        CableSolver::Auto | CableSolver::BwdEuler => eden_codegen::CableSolverKind::BackwardEuler,
        CableSolver::FwdEuler => eden_codegen::CableSolverKind::ForwardEuler,
    }
}
