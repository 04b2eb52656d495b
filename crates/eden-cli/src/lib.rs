//! Command-line front end for the EDEN model compiler and time-stepping
//! engine (§10).
//!
//! Thin layer over the library crates: [`config`] loads a `Model`/
//! `SimulatorConfig` pair from TOML, [`commands`] wires up the `run`/
//! `inspect`/`decompose` subcommands, and [`error`] aggregates every
//! upstream crate's error type behind one [`error::CliError`], the only
//! place in this workspace that maps a failure to a process exit code.

#![deny(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;

pub use commands::EdenCli;
pub use error::{CliError, CliResult};
