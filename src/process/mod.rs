//! Run a child process and collect what it writes.
//!
//! [`ProcessOutput`] launches a command with stdout and stderr piped, feeds it
//! optional input, and either buffers both streams ([`ProcessOutput::run`]) or
//! yields one of them lazily, line by line ([`ProcessOutput::iter_stdout`],
//! [`ProcessOutput::iter_stderr`]).
//!
//! # Pipe draining
//!
//! A child writing to both pipes can fill either one. Reading stdout to the
//! end before touching stderr would then deadlock: the child blocks on the
//! full stderr pipe and never closes stdout. Every stream that is not being
//! consumed by the caller is therefore drained on its own reader thread.
//!
//! # Line handling
//!
//! Output is read line by line. Terminators (`\n`, or `\r\n`) are stripped
//! and buffered output is rejoined with single `\n` separators, so mixed
//! terminators come back normalised and a trailing newline is dropped.
//!
//! # Timeouts
//!
//! A timeout is measured from launch. It bounds the wait for the child to
//! exit and, for line iterators, the wait for each line. By default it is
//! advisory: the child keeps running and [`ProcessError::Timeout`] reports its
//! pid. Use [`TimeoutAction::Kill`] to kill and reap it instead.
//!
//! # Examples
//!
//! ```no_run
//! use outputcatcher::process::ProcessOutput;
//!
//! let completed = ProcessOutput::new(["cat"])
//!     .stdin_data("This is a test.")
//!     .run()
//!     .expect("cat should run");
//! assert_eq!(completed.stdout(), b"This is a test.");
//! ```

mod error;
mod execution;
mod input;
mod lines;
mod pipes;
mod redaction;

pub use error::ProcessError;
pub use input::DEFAULT_SPOOL_LIMIT;
pub use lines::OutputLines;

use std::{
    ffi::OsString,
    path::PathBuf,
    process::{Command, ExitStatus},
    time::Duration,
};

use crate::catcher::Stream;

/// What to do with a child that outlives its timeout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Report the timeout and leave the child running.
    #[default]
    Leave,
    /// Kill and reap the child, then report the timeout.
    Kill,
}

/// Process launch options passed through to [`Command`].
///
/// Stream redirection is deliberately absent: stdin, stdout, and stderr are
/// always set up by the runner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    current_dir: Option<PathBuf>,
    env_clear: bool,
    env: Vec<(OsString, Option<OsString>)>,
}

impl LaunchOptions {
    fn apply(&self, command: &mut Command) {
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        if self.env_clear {
            command.env_clear();
        }
        for (key, value) in &self.env {
            match value {
                Some(value) => command.env(key, value),
                None => command.env_remove(key),
            };
        }
    }
}

/// Builder and runner for a captured child process.
///
/// [`run`](Self::run) consumes the runner; clone it first to run the same
/// command again.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    command_line: Vec<OsString>,
    input: Option<Vec<u8>>,
    timeout: Option<Duration>,
    on_timeout: TimeoutAction,
    options: LaunchOptions,
    spool_limit: usize,
    capture_limit: Option<u64>,
}

impl ProcessOutput {
    /// Prepare to run `command_line`, whose first element is the program.
    pub fn new<I, S>(command_line: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            command_line: command_line.into_iter().map(Into::into).collect(),
            input: None,
            timeout: None,
            on_timeout: TimeoutAction::default(),
            options: LaunchOptions::default(),
            spool_limit: DEFAULT_SPOOL_LIMIT,
            capture_limit: None,
        }
    }

    /// Bytes to feed the child on stdin. Text and raw bytes are both accepted.
    #[must_use]
    pub fn stdin_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    /// Bound the wait for the child to exit.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Choose what happens to a child that outlives the timeout.
    #[must_use]
    pub const fn on_timeout(mut self, action: TimeoutAction) -> Self {
        self.on_timeout = action;
        self
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.current_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.options.env.push((key.into(), Some(value.into())));
        self
    }

    /// Remove an environment variable for the child.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.options.env.push((key.into(), None));
        self
    }

    /// Start the child with an empty environment plus any [`env`](Self::env)
    /// entries.
    #[must_use]
    pub const fn env_clear(mut self) -> Self {
        self.options.env_clear = true;
        self
    }

    /// Bytes of input kept in memory before spilling to a temporary file.
    #[must_use]
    pub const fn spool_limit(mut self, bytes: usize) -> Self {
        self.spool_limit = bytes;
        self
    }

    /// Fail with [`ProcessError::OutputLimit`] when a buffered stream exceeds
    /// `bytes`.
    #[must_use]
    pub const fn capture_limit(mut self, bytes: u64) -> Self {
        self.capture_limit = Some(bytes);
        self
    }

    /// The command line as given.
    #[must_use]
    pub fn command_line(&self) -> &[OsString] {
        &self.command_line
    }

    /// Launch the child, feed its input, and collect both streams.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] when the executable is missing,
    /// [`ProcessError::Timeout`] when the child outlives the timeout, and the
    /// other [`ProcessError`] variants for pipe and spawn failures. A non-zero
    /// exit status is not an error here; see [`Completed::into_success`].
    pub fn run(self) -> Result<Completed, ProcessError> {
        execution::run_capture(&self)
    }

    /// Launch a fresh child and iterate over its stdout lines.
    ///
    /// The timeout bounds the whole iteration. The
    /// [`capture_limit`](Self::capture_limit) applies only to the stderr bytes
    /// drained in the background; lines of stdout are handed over as they
    /// arrive and are never counted against it.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] when the child cannot be started.
    pub fn iter_stdout(&self) -> Result<OutputLines, ProcessError> {
        OutputLines::open(self, Stream::Stdout)
    }

    /// Launch a fresh child and iterate over its stderr lines.
    ///
    /// The timeout bounds the whole iteration. The
    /// [`capture_limit`](Self::capture_limit) applies only to the stdout bytes
    /// drained in the background; lines of stderr are handed over as they
    /// arrive and are never counted against it.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] when the child cannot be started.
    pub fn iter_stderr(&self) -> Result<OutputLines, ProcessError> {
        OutputLines::open(self, Stream::Stderr)
    }
}

/// Output of a child that has been waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: ExitStatus,
}

impl Completed {
    /// Captured stdout.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Captured stderr.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Exit status of the child.
    #[must_use]
    pub const fn status(&self) -> ExitStatus {
        self.status
    }

    /// Exit code, or `None` when the child was killed by a signal.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Whether the child exited successfully.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Split into `(stdout, stderr)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.stdout, self.stderr)
    }

    /// Keep the output only if the child exited successfully.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Exit`] carrying the status and stderr when the
    /// child failed.
    pub fn into_success(self) -> Result<Self, ProcessError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(ProcessError::from_exit(self.status, self.stderr))
        }
    }
}
