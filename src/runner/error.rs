//! Error type for the `outputcatcher` binary and its exit-code mapping.

// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::{config::ConfigError, process::ProcessError};

/// Exit code when our own stdout or the child's stdin closed early.
pub const EXIT_BROKEN_PIPE: u8 = 3;
/// Exit code when a captured stream exceeded its byte ceiling.
pub const EXIT_OUTPUT_LIMIT: u8 = 4;
/// Exit code for invalid configuration (`EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;
/// Exit code when the child outlived its timeout.
pub const EXIT_TIMEOUT: u8 = 124;
/// Exit code when the child could not be started.
pub const EXIT_SPAWN: u8 = 126;
/// Exit code when the executable was not found.
pub const EXIT_NOT_FOUND: u8 = 127;

/// Errors raised by [`run`](super::run).
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// Configuration could not be read.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    /// The child process failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),
    /// Captured output could not be forwarded.
    #[error("failed to write captured output: {0}")]
    #[diagnostic(code(outputcatcher::runner::output))]
    Output(#[source] io::Error),
}

impl RunnerError {
    /// Process exit code reported for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Process(ProcessError::NotFound { .. }) => EXIT_NOT_FOUND,
            Self::Process(ProcessError::Spawn { .. }) => EXIT_SPAWN,
            Self::Process(ProcessError::Timeout { .. }) => EXIT_TIMEOUT,
            Self::Process(ProcessError::BrokenPipe { .. }) => EXIT_BROKEN_PIPE,
            Self::Process(ProcessError::OutputLimit { .. }) => EXIT_OUTPUT_LIMIT,
            Self::Output(err) if err.kind() == io::ErrorKind::BrokenPipe => EXIT_BROKEN_PIPE,
            Self::Process(_) | Self::Output(_) => 1,
        }
    }
}
