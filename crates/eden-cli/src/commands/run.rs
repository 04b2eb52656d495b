//! `eden run`: load a model and simulator config, then drive the engine to
//! completion (§4.6).

use std::path::PathBuf;

use clap::Args;

use crate::config::{load_config, load_model};
use crate::error::CliResult;

/// Load a model and simulator config, compile its kernels, and run the
/// time-stepping engine to completion.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Path to a TOML-encoded `Model`.
    pub model: PathBuf,

    /// Path to a TOML-encoded `SimulatorConfig`; defaults to the engine's
    /// documented defaults if omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of simulated ranks (§4.5); every rank runs in this one process
    /// over a loopback transport.
    #[arg(long, default_value_t = 1)]
    pub ranks: u32,

    /// Directory generated kernel sources and shared objects are written to.
    #[arg(long, default_value = "eden-work")]
    pub work_dir: PathBuf,

    /// Directory trajectory logs are written under, one subdirectory per
    /// rank.
    #[arg(long, default_value = "eden-logs")]
    pub log_dir: PathBuf,
}

impl RunCommand {
    /// Run this command.
    pub fn execute(&self) -> CliResult<()> {
        let model = load_model(&self.model)?;
        let config = load_config(self.config.as_deref())?;
        log::info!("running '{}' across {} rank(s)", self.model.display(), self.ranks);
        eden_engine::run_simulation(&model, &config, self.ranks, &self.work_dir, &self.log_dir)?;
        log::info!("simulation complete, trajectories written under {}", self.log_dir.display());
        Ok(())
    }
}
