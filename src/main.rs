mod args;
mod commands;
mod shared;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use args::{AppCommand, Cli};
use commands::{run_batch, run_job};
use shared::logger;

// Top-level entrypoint: parse CLI args, build the logger from them, and dispatch to a command module.
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let log = logger::dispatch(&cli.log_config());
    tracing::dispatcher::set_global_default(log.clone()).context("installing logger failed")?;

    let status = match cli.command {
        AppCommand::Job(args) => run_job(args, log)?,
        AppCommand::Batch(args) => run_batch(args, log)?,
    };
    Ok(exit_code(status))
}

// Nonzero statuses that do not fit in a process exit code collapse to 1.
fn exit_code(status: i32) -> ExitCode {
    if status == 0 {
        return ExitCode::SUCCESS;
    }
    u8::try_from(status)
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}
