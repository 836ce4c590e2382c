//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use outputcatcher::{cli::Cli, runner};
use std::{io, process::ExitCode};
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt()
        .with_max_level(max_level)
        .with_writer(io::stderr)
        .init();
    match runner::run(&cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "outputcatcher failed");
            ExitCode::from(err.exit_code())
        }
    }
}
