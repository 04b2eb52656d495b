//! Loading a [`Model`] and [`SimulatorConfig`] from TOML fixture files (§10).
//!
//! The NeuroML/LEMS parser that would normally produce a `Model` is out of
//! scope for this crate (§1 Out of scope); in its place, `eden-cli` reads a
//! `Model` straight off disk as TOML, since both types already derive
//! `serde::{Serialize, Deserialize}`.

use std::path::Path;

use eden_model::{Model, SimulatorConfig};

use crate::error::{CliError, CliResult};

/// Read and parse a `Model` from a TOML file.
pub fn load_model(path: &Path) -> CliResult<Model> {
    load_toml(path)
}

/// Read and parse a `SimulatorConfig` from a TOML file, if given; otherwise
/// the engine's documented defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<SimulatorConfig> {
    match path {
        Some(path) => load_toml(path),
        None => Ok(SimulatorConfig::default()),
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::Read { path: path.to_path_buf(), source: e })?;
    toml::from_str(&text).map_err(|e| CliError::Toml { path: path.to_path_buf(), source: e })
}
