//! `eden decompose`: print the GID-to-rank partition for a neuron count and
//! rank count, a pure function of §4.5 useful standalone.

use clap::Args;
use eden_decomp::decompose;

use crate::error::CliResult;

/// Print the contiguous GID range each rank owns for a given total neuron
/// count and rank count.
#[derive(Args, Debug)]
pub struct DecomposeCommand {
    /// Total number of neurons across the whole model.
    #[arg(long)]
    pub neurons: u32,

    /// Number of ranks to partition across.
    #[arg(long)]
    pub ranks: u32,
}

impl DecomposeCommand {
    /// Run this command.
    pub fn execute(&self) -> CliResult<()> {
        let partitions = decompose(self.neurons, self.ranks)?;
        for partition in &partitions {
            println!("rank {}: [{}, {})", partition.rank, partition.gids.start, partition.gids.end);
        }
        Ok(())
    }
}
