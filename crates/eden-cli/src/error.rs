//! CLI-level error aggregation and exit codes (§7).
//!
//! Every library crate keeps its own `thiserror`-derived error enum; this is
//! the one place they get folded together into a single CLI-facing error.
//! `main` is the only place that turns a [`CliError`] into a process exit
//! code.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = std::result::Result<T, CliError>;

/// Errors a CLI command can return.
#[derive(Error, Debug)]
pub enum CliError {
    /// Model construction or validation failed.
    #[error(transparent)]
    Model(#[from] eden_model::ModelError),

    /// Instantiation failed.
    #[error(transparent)]
    Instantiate(#[from] eden_instantiate::InstantiateError),

    /// Domain decomposition failed.
    #[error(transparent)]
    Decomp(#[from] eden_decomp::DecompError),

    /// Kernel emission, compilation, or loading failed.
    #[error(transparent)]
    Codegen(#[from] eden_codegen::CodegenError),

    /// Instantiation, compilation, or stepping failed inside the engine.
    #[error(transparent)]
    Engine(#[from] eden_engine::EngineError),

    /// Reading a model or config file from disk failed.
    #[error("could not read '{path}': {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A model or config file did not parse as TOML.
    #[error("'{path}' is not valid TOML: {source}")]
    Toml {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The requested command arguments describe a configuration this build
    /// does not support (e.g. an unknown cell type id).
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
}

impl CliError {
    /// The process exit code this error should produce (§7): 2 for an
    /// unsupported configuration, 1 for everything else (file I/O, malformed
    /// input, compilation, or engine failures).
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Unsupported(_) => 2,
            _ => 1,
        }
    }
}
