//! `eden inspect`: print a cell type's abstract work-item layout without
//! running the engine (§4.2).

use std::path::PathBuf;

use clap::Args;
use eden_sig::WorkItemSignature;
use eden_tables::TableFamily;

use crate::config::load_model;
use crate::error::{CliError, CliResult};

/// Print the scalar and table layout the Signature Builder would assign a
/// cell type, without compiling or running anything.
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Path to a TOML-encoded `Model`.
    pub model: PathBuf,

    /// Cell type id to inspect.
    #[arg(long)]
    pub cell_type: u32,
}

impl InspectCommand {
    /// Run this command.
    pub fn execute(&self) -> CliResult<()> {
        let model = load_model(&self.model)?;
        let cell = model
            .cell_types
            .iter()
            .find(|c| c.id == self.cell_type)
            .ok_or_else(|| CliError::Unsupported(format!("model has no cell type with id {}", self.cell_type)))?;

        let sig = WorkItemSignature::build(cell);
        print_signature(cell, &sig);
        Ok(())
    }
}

fn print_signature(cell: &eden_model::CellType, sig: &WorkItemSignature) {
    println!("cell type '{}' (id {})", cell.name, cell.id);
    println!("  segments: {}", cell.segment_count);
    println!("  scalar constants: {}", sig.scalars.constant_count());
    println!("  scalar state: {}", sig.scalars.state_count());
    for family in [TableFamily::ConstF32, TableFamily::ConstI64, TableFamily::StateF32, TableFamily::StateI64] {
        println!("  tables[{family:?}]: {}", sig.tables.table_count(family));
    }
    println!("  random draws/step: {}", sig.random_call_count);
    match &sig.compartment_strategy {
        Some(strategy) => println!("  compartment strategy: {strategy:?}"),
        None => println!("  compartment strategy: none"),
    }
    match &sig.elimination_order {
        Some(order) => println!("  elimination order: {:?}", order.order_list),
        None => println!("  elimination order: none (single compartment)"),
    }
}
