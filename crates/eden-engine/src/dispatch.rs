//! Compute-phase kernel dispatch (§4.6 step 3).
//!
//! Builds the per-family table pointer and size arrays once per step (the
//! "now"/"next" identity flips after every swap phase, so these cannot be
//! cached across steps) and calls each work item's `doit` kernel through a
//! rayon work-sharing parallel iterator. Work items never read another work
//! item's "next" buffer, so this is race-free except for the trigger arrays,
//! which the emitted kernels write with an atomic fetch-or.

use std::collections::HashMap;

use eden_codegen::{IterationCallback, LoadedKernel};
use eden_tables::{Tables, WorkItemId, WorkItemOffsets};
use rayon::prelude::*;

use crate::error::{EngineError, Result};

struct ConstFamily<T> {
    ptrs: Vec<*const T>,
    sizes: Vec<i64>,
}

// Built fresh from `Tables` immediately before a call that consumes it; never
// outlives the step that built it, so sharing the raw pointers across the
// rayon pool for that one call is sound.
unsafe impl<T> Send for ConstFamily<T> {}
unsafe impl<T> Sync for ConstFamily<T> {}

impl<T> ConstFamily<T> {
    fn build(tables: &[Vec<T>]) -> Self {
        Self {
            ptrs: tables.iter().map(|t| t.as_ptr()).collect(),
            sizes: tables.iter().map(|t| t.len() as i64).collect(),
        }
    }
}

struct MutFamily<T> {
    ptrs: Vec<*mut T>,
}

unsafe impl<T> Send for MutFamily<T> {}
unsafe impl<T> Sync for MutFamily<T> {}

impl<T> MutFamily<T> {
    fn build(tables: &mut [Vec<T>]) -> Self {
        Self { ptrs: tables.iter_mut().map(|t| t.as_mut_ptr()).collect() }
    }
}

struct RawMutPtr<T>(*mut T);
unsafe impl<T> Send for RawMutPtr<T> {}
unsafe impl<T> Sync for RawMutPtr<T> {}

struct RawConstPtr<T>(*const T);
unsafe impl<T> Send for RawConstPtr<T> {}
unsafe impl<T> Sync for RawConstPtr<T> {}

/// Advance every work item of `tables` by one step, dispatching each to its
/// cell type's loaded kernel. `work_item_cell_type[i]` is the cell type id of
/// work item `i`; `scalar_now`/`scalar_next` are the engine's own
/// double-buffered flat scalar state (not owned by `Tables`, see §4.6).
pub fn compute_step(
    time_ms: f64,
    dt_ms: f64,
    step: i64,
    tables: &mut Tables,
    scalar_now: &[f32],
    scalar_next: &mut [f32],
    kernels: &HashMap<u32, LoadedKernel>,
    work_item_cell_type: &[u32],
) -> Result<()> {
    let work_item_count = tables.work_item_count();
    let offsets: Vec<WorkItemOffsets> = (0..work_item_count)
        .map(|i| {
            tables
                .work_item_offsets(WorkItemId::new(i))
                .unwrap_or_else(|| panic!("work item {i} has no recorded offsets"))
        })
        .collect();

    let const_f32 = ConstFamily::build(&tables.const_f32);
    let const_i64 = ConstFamily::build(&tables.const_i64);
    let state_f32_now = ConstFamily::build(&tables.state_f32_now);
    let state_i64_now = ConstFamily::build(&tables.state_i64_now);
    let state_f32_next = MutFamily::build(&mut tables.state_f32_next);
    let state_i64_next = MutFamily::build(&mut tables.state_i64_next);
    let scalar_next_ptr = RawMutPtr(scalar_next.as_mut_ptr());
    let global_constants_ptr = RawConstPtr(tables.global_constants.as_ptr());
    let scalar_state_now_ptr = RawConstPtr(scalar_now.as_ptr());

    (0..work_item_count as usize).into_par_iter().try_for_each(|i| -> Result<()> {
        let cell_type = work_item_cell_type[i];
        let kernel = kernels.get(&cell_type).ok_or(EngineError::MissingKernel { cell_type })?;
        let off = &offsets[i];
        let doit: IterationCallback = kernel.doit();

        unsafe {
            doit(
                time_ms,
                dt_ms,
                global_constants_ptr.0,
                off.const_f32_offset as i64,
                const_f32.sizes.as_ptr(),
                const_f32.ptrs.as_ptr(),
                off.table_const_f32_start as i64,
                const_i64.sizes.as_ptr(),
                const_i64.ptrs.as_ptr(),
                off.table_const_i64_start as i64,
                state_f32_now.sizes.as_ptr(),
                state_f32_now.ptrs.as_ptr(),
                state_f32_next.ptrs.as_ptr(),
                off.table_state_f32_start as i64,
                state_i64_now.sizes.as_ptr(),
                state_i64_now.ptrs.as_ptr(),
                state_i64_next.ptrs.as_ptr(),
                off.table_state_i64_start as i64,
                scalar_state_now_ptr.0,
                scalar_next_ptr.0,
                off.state_f32_offset as i64,
                step,
            );
        }
        Ok(())
    })
}
