//! Spawning, waiting, and buffered capture for [`ProcessOutput`].

use std::{
    ffi::OsStr,
    io,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use wait_timeout::ChildExt;

use super::{
    Completed, ProcessOutput, TimeoutAction,
    error::ProcessError,
    input::{ChildInput, WriterHandle, spawn_stdin_writer},
    pipes::{PipeSpec, detach_reader, handle_stdin_result, join_reader, spawn_line_reader},
    redaction::display_command_line,
};
use crate::catcher::Stream;

/// A freshly spawned child plus the thread feeding its stdin, if any.
pub(super) struct Launched {
    pub(super) child: Child,
    pub(super) stdin_writer: Option<WriterHandle>,
}

/// Spawn the child with stdout and stderr piped and stdin taken from the
/// spooled input.
///
/// The parent's handle on a spilled input file is released as soon as
/// `spawn` returns, whether or not it succeeded.
pub(super) fn launch(runner: &ProcessOutput) -> Result<Launched, ProcessError> {
    let (program, args) = runner
        .command_line
        .split_first()
        .ok_or(ProcessError::EmptyCommand)?;
    let input = ChildInput::spool(runner.input.as_deref(), runner.spool_limit)?;
    let (stdin, pending) = input.into_stdio();

    let mut command = Command::new(program);
    command.args(args);
    runner.options.apply(&mut command);
    command
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::info!(
        "Running command: {}",
        display_command_line(&runner.command_line)
    );
    let spawned = command.spawn();
    drop(command);
    let mut child = spawned.map_err(|source| spawn_error(program, source))?;
    tracing::debug!(pid = child.id(), "child process started");

    let stdin_writer = pending.and_then(|bytes| spawn_stdin_writer(child.stdin.take(), bytes));
    Ok(Launched {
        child,
        stdin_writer,
    })
}

fn spawn_error(program: &OsStr, source: io::Error) -> ProcessError {
    let name = program.to_string_lossy().into_owned();
    if source.kind() == io::ErrorKind::NotFound {
        ProcessError::NotFound {
            program: name,
            source,
        }
    } else {
        ProcessError::Spawn {
            program: name,
            source,
        }
    }
}

/// Point in time by which the child must have finished.
///
/// Started once the child is running and shared by every wait on it, so a
/// line iterator and its final wait draw on the same budget.
#[derive(Clone, Copy, Debug)]
pub(super) struct Deadline {
    limit: Duration,
    at: Instant,
}

impl Deadline {
    /// Start the clock for `limit`; `None` when there is no limit or it is too
    /// far in the future to represent.
    pub(super) fn start(limit: Option<Duration>) -> Option<Self> {
        let span = limit?;
        Instant::now()
            .checked_add(span)
            .map(|at| Self { limit: span, at })
    }

    /// Time left before the deadline, zero once it has passed.
    pub(super) fn remaining(self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// The configured timeout.
    pub(super) const fn limit(self) -> Duration {
        self.limit
    }
}

/// Wait for the child, honouring an optional deadline.
///
/// On timeout the child is only killed when `on_timeout` says so; otherwise
/// it is left running and its pid is reported.
pub(super) fn wait_for_exit(
    child: &mut Child,
    deadline: Option<Deadline>,
    on_timeout: TimeoutAction,
) -> Result<ExitStatus, ProcessError> {
    let Some(due) = deadline else {
        return child.wait().map_err(ProcessError::Io);
    };
    if let Some(status) = child
        .wait_timeout(due.remaining())
        .map_err(ProcessError::Io)?
    {
        return Ok(status);
    }
    Err(timed_out(child, due.limit(), on_timeout))
}

/// Apply the timeout policy to a child that missed its deadline and describe
/// what happened.
pub(super) fn timed_out(
    child: &mut Child,
    limit: Duration,
    on_timeout: TimeoutAction,
) -> ProcessError {
    let pid = child.id();
    match on_timeout {
        TimeoutAction::Leave => {
            tracing::warn!(pid, ?limit, "process still running after timeout; leaving it");
            ProcessError::Timeout {
                timeout: limit,
                pid,
                killed: false,
            }
        }
        TimeoutAction::Kill => {
            if let Err(err) = child.kill()
                && err.kind() != io::ErrorKind::InvalidInput
            {
                return ProcessError::Io(err);
            }
            if let Err(err) = child.wait() {
                tracing::warn!("failed to reap timed-out command: {err}");
            }
            ProcessError::Timeout {
                timeout: limit,
                pid,
                killed: true,
            }
        }
    }
}

pub(super) fn terminate_child(child: &mut Child, context: &str) {
    if let Err(err) = child.kill() {
        tracing::debug!("failed to kill child after {context}: {err}");
    }
    if let Err(err) = child.wait() {
        tracing::debug!("failed to reap child after {context}: {err}");
    }
}

/// Run the child to completion, collecting both streams.
pub(super) fn run_capture(runner: &ProcessOutput) -> Result<Completed, ProcessError> {
    let Launched {
        mut child,
        stdin_writer,
    } = launch(runner)?;

    let mut stdout_reader = spawn_line_reader(
        child.stdout.take(),
        PipeSpec::new(Stream::Stdout, runner.capture_limit),
    );
    let mut stderr_reader = spawn_line_reader(
        child.stderr.take(),
        PipeSpec::new(Stream::Stderr, runner.capture_limit),
    );

    let deadline = Deadline::start(runner.timeout);
    let status = match wait_for_exit(&mut child, deadline, runner.on_timeout) {
        Ok(status) => status,
        Err(err) => {
            detach_reader(Stream::Stdout, stdout_reader.take());
            detach_reader(Stream::Stderr, stderr_reader.take());
            drop(stdin_writer);
            return Err(err);
        }
    };
    tracing::debug!(pid = child.id(), %status, "child process exited");

    let stdout = join_reader(stdout_reader.take());
    let stderr = join_reader(stderr_reader.take())?;
    handle_stdin_result(stdin_writer, status.code(), &stderr)?;
    Ok(Completed {
        stdout: stdout?,
        stderr,
        status,
    })
}
