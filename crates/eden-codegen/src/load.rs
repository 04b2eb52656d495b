//! Dynamic loading of a compiled kernel's fixed `doit` symbol (§4.3, per
//! `original_source/eden/IterationCallback.h`).
//!
//! The generated C always exports exactly one symbol, `doit`, with the
//! signature recorded in [`crate::emit::DOIT_SIGNATURE`]. We resolve it with
//! `libloading` rather than hand-rolled `dlopen` FFI, matching the ecosystem
//! convention for this kind of runtime dynamic loading.

use std::path::Path;

use libloading::{Library, Symbol};

use crate::error::{CodegenError, Result};

/// Raw C `doit` entry point: advances one work item of one cell type by one
/// step. Argument order and C types mirror `crate::emit::DOIT_SIGNATURE`
/// exactly (`long` as `i64`, `long long` as `i64`, both 8 bytes on every
/// target this engine compiles kernels for) — both sides of this contract
/// must be kept in lock-step if the signature ever changes.
pub type IterationCallback = unsafe extern "C" fn(
    time: f64,
    dt: f64,
    const_f32_scalar_base: *const f32,
    const_f32_work_offset: i64,
    const_f32_table_sizes: *const i64,
    const_f32_table_ptrs: *const *const f32,
    const_f32_table_work_offset: i64,
    const_i64_table_sizes: *const i64,
    const_i64_table_ptrs: *const *const i64,
    const_i64_table_work_offset: i64,
    state_f32_table_sizes: *const i64,
    state_f32_now_ptrs: *const *const f32,
    state_f32_next_ptrs: *const *mut f32,
    state_f32_table_work_offset: i64,
    state_i64_table_sizes: *const i64,
    state_i64_now_ptrs: *const *const i64,
    state_i64_next_ptrs: *const *mut i64,
    state_i64_table_work_offset: i64,
    state_f32_scalar_now: *const f32,
    state_f32_scalar_next: *mut f32,
    state_f32_scalar_work_offset: i64,
    step: i64,
);

/// A kernel shared object loaded into the process, with its `doit` symbol
/// already resolved.
///
/// The [`Library`] must outlive every call through the resolved function
/// pointer, so it is kept alongside it for the lifetime of this struct; the
/// pointer itself is transmuted to `'static` only because `libloading`
/// cannot express the borrow directly within a self-referential struct — the
/// real lifetime is tied to `library` being dropped last, which the default
/// field drop order guarantees.
pub struct LoadedKernel {
    /// Kept alive for as long as `doit` may be called; never accessed after
    /// construction.
    library: Library,
    doit: IterationCallback,
}

impl LoadedKernel {
    /// Load the shared object at `path` and resolve its `doit` symbol.
    pub fn open(path: &Path) -> Result<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| CodegenError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let doit = unsafe {
            let symbol: Symbol<IterationCallback> =
                library.get(b"doit\0").map_err(|e| CodegenError::SymbolNotFound {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            std::mem::transmute::<IterationCallback, IterationCallback>(*symbol)
        };

        Ok(Self { library, doit })
    }

    /// The resolved `doit` function pointer.
    ///
    /// # Safety
    ///
    /// The caller must pass pointer arrays whose layout exactly matches the
    /// work-item signature this kernel was emitted against — this is an
    /// Internal-invariant-broken failure mode (§7) if violated, not
    /// something this API can check.
    pub fn doit(&self) -> IterationCallback {
        self.doit
    }
}

// `Library` is `Send`/`Sync` on the platforms libloading supports opening a
// shared object on; the raw function pointer is likewise safe to share once
// resolved, since `doit` itself only touches the table buffers passed to it.
unsafe impl Send for LoadedKernel {}
unsafe impl Sync for LoadedKernel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_file_reports_load_failed() {
        let err = LoadedKernel::open(Path::new("/nonexistent/path/does_not_exist.so")).unwrap_err();
        match err {
            CodegenError::LoadFailed { .. } => {}
            other => panic!("expected LoadFailed, got {other:?}"),
        }
    }
}
