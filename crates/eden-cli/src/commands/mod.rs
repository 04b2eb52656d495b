//! CLI command implementations (§10).

use clap::{Parser, Subcommand};

use crate::error::CliResult;

pub mod decompose;
pub mod inspect;
pub mod run;

pub use decompose::DecomposeCommand;
pub use inspect::InspectCommand;
pub use run::RunCommand;

/// EDEN model compiler and parallel time-stepping engine.
#[derive(Parser, Debug)]
#[command(name = "eden", version, about = "EDEN model compiler and parallel time-stepping engine")]
pub struct EdenCli {
    /// Enable verbose (debug-level) logging, matching `SimulatorConfig::verbose`.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a model and simulator config, compile its kernels, and run the
    /// engine to completion.
    Run(RunCommand),

    /// Print a cell type's scalar/table layout without running the engine.
    Inspect(InspectCommand),

    /// Print the GID-to-rank partition for a neuron count and rank count.
    Decompose(DecomposeCommand),
}

impl EdenCli {
    /// Execute the selected subcommand.
    pub fn execute(&self) -> CliResult<()> {
        match &self.command {
            Commands::Run(cmd) => cmd.execute(),
            Commands::Inspect(cmd) => cmd.execute(),
            Commands::Decompose(cmd) => cmd.execute(),
        }
    }
}
