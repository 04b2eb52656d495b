//! Codegen-failed / Resource-exhausted errors (§7).

use thiserror::Error;

/// Result type for kernel emission, compilation, and loading.
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Errors raised while emitting, compiling, or loading a cell type's kernel.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// Writing the emitted C source file failed.
    #[error("failed to write generated source '{path}': {source}")]
    WriteFailed {
        /// Path that could not be written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The system C compiler returned non-zero.
    #[error("compiler invocation failed: `{command}`\n{stderr}")]
    CompileFailed {
        /// Full command line invoked.
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The dynamic loader could not open the compiled shared object.
    #[error("failed to load shared object '{path}': {reason}")]
    LoadFailed {
        /// Path to the shared object.
        path: String,
        /// Loader error message.
        reason: String,
    },

    /// The shared object loaded, but the fixed `doit` symbol could not be resolved.
    #[error("symbol 'doit' not found in '{path}': {reason}")]
    SymbolNotFound {
        /// Path to the shared object.
        path: String,
        /// Loader error message.
        reason: String,
    },

    /// A cell type was asked to build its kernel without a signature having
    /// been computed for it first (Internal-invariant-broken, §7).
    #[error("no signature computed for cell type {cell_type}")]
    MissingSignature {
        /// Cell type id missing its signature.
        cell_type: u32,
    },
}
