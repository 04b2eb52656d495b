//! Kernel Emitter (§4.3): lowers a cell type and its signature into a single
//! C translation unit implementing the fixed `doit` iteration-callback
//! contract, compiles it with the system C compiler, and dynamically loads
//! the resulting shared object to obtain a function pointer.
//!
//! The three stages are deliberately kept in separate modules so that
//! [`emit`] can be unit-tested on generated *text* without ever touching a
//! filesystem or a compiler: [`compile`] shells out to `cc`/`gcc`/`icc`, and
//! [`load`] wraps `libloading` to resolve the fixed `doit` symbol.

#![deny(missing_docs)]

pub mod compile;
pub mod emit;
pub mod error;
pub mod load;

pub use compile::{compile_kernel, CompileOptions};
pub use emit::{emit_kernel_source, CableSolverKind};
pub use error::{CodegenError, Result};
pub use load::{IterationCallback, LoadedKernel};

use eden_model::{CellType, Model};
use eden_sig::WorkItemSignature;
use std::collections::HashMap;
use std::path::Path;

/// Build, compile, and load the kernel for every cell type in `model`,
/// writing generated sources and shared objects under `work_dir` (§4.3.6).
///
/// Returns one [`LoadedKernel`] per cell type id. This is the single entry
/// point `eden-engine` calls once per distinct cell type at startup.
pub fn build_all_kernels(
    model: &Model,
    signatures: &HashMap<u32, WorkItemSignature>,
    work_dir: &Path,
    options: &CompileOptions,
) -> Result<HashMap<u32, LoadedKernel>> {
    let mut kernels = HashMap::new();
    for cell in &model.cell_types {
        let sig = signatures
            .get(&cell.id)
            .ok_or_else(|| CodegenError::MissingSignature { cell_type: cell.id })?;
        let kernel = build_one_kernel(cell, sig, work_dir, options)?;
        kernels.insert(cell.id, kernel);
    }
    Ok(kernels)
}

/// Emit, compile, and load the kernel for a single cell type.
pub fn build_one_kernel(
    cell: &CellType,
    sig: &WorkItemSignature,
    work_dir: &Path,
    options: &CompileOptions,
) -> Result<LoadedKernel> {
    let source = emit_kernel_source(cell, sig, options.cable_solver);
    let source_path = work_dir.join(format!("{}_code.gen.c", cell.name));
    std::fs::write(&source_path, &source).map_err(|e| CodegenError::WriteFailed {
        path: source_path.display().to_string(),
        source: e,
    })?;
    log::debug!("emitted kernel source for cell type '{}' at {}", cell.name, source_path.display());

    let so_path = work_dir.join(format!("{}_code.gen.so", cell.name));
    compile::compile_kernel(&source_path, &so_path, options)?;
    log::info!("compiled kernel for cell type '{}' -> {}", cell.name, so_path.display());

    let kernel = load::LoadedKernel::open(&so_path)?;
    Ok(kernel)
}
