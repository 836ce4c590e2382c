//! Failures reported by [`ProcessOutput`](super::ProcessOutput).

// The `unused_assignments` lint fires on miette/thiserror derive expansion in
// some Rust versions only, so `#[expect]` cannot be used here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use std::{io, process::ExitStatus, time::Duration};

use miette::Diagnostic;
use thiserror::Error;

use crate::catcher::Stream;

/// Errors raised while launching, feeding, draining, or waiting on a child.
#[derive(Debug, Error, Diagnostic)]
pub enum ProcessError {
    /// The command line had no program to run.
    #[error("no command was given")]
    #[diagnostic(code(outputcatcher::process::empty_command))]
    EmptyCommand,
    /// The executable could not be located.
    #[error("executable `{program}` was not found")]
    #[diagnostic(
        code(outputcatcher::process::not_found),
        help("check the program name and that its directory is on PATH")
    )]
    NotFound {
        /// Program as given on the command line.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The executable exists but could not be started.
    #[error("failed to start `{program}`")]
    #[diagnostic(code(outputcatcher::process::spawn))]
    Spawn {
        /// Program as given on the command line.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// An I/O error occurred while talking to the running process.
    #[error("I/O error while talking to the child process")]
    #[diagnostic(code(outputcatcher::process::io))]
    Io(#[from] io::Error),
    /// The child closed its input early and then failed.
    #[error("child closed its input before all data was written ({})", describe_code(*.status))]
    #[diagnostic(code(outputcatcher::process::broken_pipe))]
    BrokenPipe {
        /// Underlying OS error.
        #[source]
        source: io::Error,
        /// Exit status if the process reported one.
        status: Option<i32>,
        /// Captured stderr bytes.
        stderr: Vec<u8>,
    },
    /// A stream produced more bytes than the configured ceiling.
    #[error("{stream} output exceeded the {limit} byte capture limit")]
    #[diagnostic(code(outputcatcher::process::output_limit))]
    OutputLimit {
        /// Which pipe exceeded the budget.
        stream: Stream,
        /// The configured byte ceiling.
        limit: u64,
    },
    /// The process failed to exit before the deadline.
    #[error("process {pid} did not exit within {timeout:?}{}", killed_suffix(*.killed))]
    #[diagnostic(
        code(outputcatcher::process::timeout),
        help("the timeout is advisory unless the runner was told to kill on timeout")
    )]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
        /// OS process id of the child.
        pid: u32,
        /// Whether the child was killed and reaped.
        killed: bool,
    },
    /// The process exited unsuccessfully.
    #[error("process {}{}", describe_code(*.status), stderr_suffix(.stderr))]
    #[diagnostic(code(outputcatcher::process::exit))]
    Exit {
        /// Exit status (`None` when terminated by a signal).
        status: Option<i32>,
        /// Captured stderr bytes.
        stderr: Vec<u8>,
    },
}

impl ProcessError {
    pub(super) fn from_exit(status: ExitStatus, stderr: Vec<u8>) -> Self {
        Self::Exit {
            status: status.code(),
            stderr,
        }
    }
}

fn describe_code(status: Option<i32>) -> String {
    status.map_or_else(
        || String::from("terminated by a signal"),
        |code| format!("exited with status {code}"),
    )
}

const fn killed_suffix(killed: bool) -> &'static str {
    if killed { " and was killed" } else { "" }
}

fn stderr_suffix(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
