//! rhassistant CLI: ask the CDG HR assistant and run the validation queue.
//!
//! Stands in for the HTTP boundary: it authenticates nothing, but passes the
//! caller identity given by `--user-id` and `--role` to every operation.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::report_outcome(commands::run(cli).await)
}
