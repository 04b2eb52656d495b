//! `eden` binary entry point.

use clap::Parser;
use eden_cli::EdenCli;

fn main() {
    let cli = EdenCli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = cli.execute() {
        log::error!("{err}");
        std::process::exit(err.exit_code());
    }
}
