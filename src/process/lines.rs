//! Lazy, line-at-a-time access to one output stream of a child.

use std::{
    fmt,
    iter::FusedIterator,
    process::{Child, ExitStatus},
    sync::mpsc::RecvTimeoutError,
};

use super::{
    ProcessOutput, TimeoutAction,
    error::ProcessError,
    execution::{Deadline, Launched, launch, terminate_child, timed_out, wait_for_exit},
    input::WriterHandle,
    pipes::{
        LineFeed, PipeSpec, ReaderHandle, detach_reader, handle_stdin_result, join_reader,
        spawn_line_feed, spawn_line_reader,
    },
};
use crate::catcher::Stream;

/// Single-pass iterator over the lines of one stream of a freshly launched
/// child.
///
/// Lines are yielded without their terminators as soon as the child writes
/// them. The other stream is drained on a background thread; its bytes are
/// available from [`OutputLines::drained`] once iteration has finished.
///
/// The runner's timeout is measured from launch and bounds the whole
/// iteration: a child that stays silent past it yields a final
/// [`ProcessError::Timeout`] after the configured [`TimeoutAction`] has been
/// applied. A broken input pipe also surfaces as a final `Err` item. Dropping
/// the iterator early terminates the child.
pub struct OutputLines {
    stream: Stream,
    lines: Option<LineFeed>,
    child: Option<Child>,
    drain: Option<ReaderHandle>,
    stdin_writer: Option<WriterHandle>,
    deadline: Option<Deadline>,
    on_timeout: TimeoutAction,
    status: Option<ExitStatus>,
    drained: Vec<u8>,
    done: bool,
}

impl fmt::Debug for OutputLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputLines")
            .field("stream", &self.stream)
            .field("status", &self.status)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl OutputLines {
    pub(super) fn open(runner: &ProcessOutput, stream: Stream) -> Result<Self, ProcessError> {
        let Launched {
            mut child,
            stdin_writer,
        } = launch(runner)?;
        let deadline = Deadline::start(runner.timeout);

        let (primary, drain) = match stream {
            Stream::Stdout => (
                child.stdout.take().map(spawn_line_feed),
                spawn_line_reader(
                    child.stderr.take(),
                    PipeSpec::new(Stream::Stderr, runner.capture_limit),
                ),
            ),
            Stream::Stderr => (
                child.stderr.take().map(spawn_line_feed),
                spawn_line_reader(
                    child.stdout.take(),
                    PipeSpec::new(Stream::Stdout, runner.capture_limit),
                ),
            ),
        };
        let Some(lines) = primary else {
            terminate_child(&mut child, "pipe setup failure");
            return Err(ProcessError::Io(std::io::Error::other(format!(
                "child process missing {stream} pipe"
            ))));
        };

        Ok(Self {
            stream,
            lines: Some(lines),
            child: Some(child),
            drain,
            stdin_writer,
            deadline,
            on_timeout: runner.on_timeout,
            status: None,
            drained: Vec::new(),
            done: false,
        })
    }

    /// The stream being iterated.
    #[must_use]
    pub const fn stream(&self) -> Stream {
        self.stream
    }

    /// Exit status, available once every line has been read.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Bytes drained from the other stream, available once iteration ends.
    #[must_use]
    pub fn drained(&self) -> &[u8] {
        &self.drained
    }

    const fn other_stream(&self) -> Stream {
        match self.stream {
            Stream::Stdout => Stream::Stderr,
            Stream::Stderr => Stream::Stdout,
        }
    }

    /// Give up on a child that missed its deadline while lines were pending.
    fn expire(&mut self, deadline: Deadline) -> Option<Result<Vec<u8>, ProcessError>> {
        self.done = true;
        self.lines = None;
        drop(self.stdin_writer.take());
        detach_reader(self.other_stream(), self.drain.take());
        let mut child = self.child.take()?;
        tracing::debug!(stream = %self.stream, "deadline passed during line iteration");
        Some(Err(timed_out(&mut child, deadline.limit(), self.on_timeout)))
    }

    fn finish(&mut self) -> Option<Result<Vec<u8>, ProcessError>> {
        self.done = true;
        self.lines = None;
        let mut child = self.child.take()?;
        let status = match wait_for_exit(&mut child, self.deadline, self.on_timeout) {
            Ok(status) => status,
            Err(err) => {
                detach_reader(self.other_stream(), self.drain.take());
                return Some(Err(err));
            }
        };
        tracing::debug!(%status, stream = %self.stream, "line iteration finished");
        self.status = Some(status);
        match join_reader(self.drain.take()) {
            Ok(bytes) => self.drained = bytes,
            Err(err) => return Some(Err(err)),
        }
        // Lines already handed to the caller are not kept, so a broken input
        // pipe while iterating stderr reports no stderr bytes.
        let stderr: &[u8] = match self.stream {
            Stream::Stdout => &self.drained,
            Stream::Stderr => &[],
        };
        let writer = self.stdin_writer.take();
        handle_stdin_result(writer, status.code(), stderr)
            .err()
            .map(Err)
    }
}

impl Iterator for OutputLines {
    type Item = Result<Vec<u8>, ProcessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(lines) = self.lines.as_ref() else {
            return self.finish();
        };
        let received = match self.deadline {
            Some(deadline) => match lines.recv_timeout(deadline.remaining()) {
                Err(RecvTimeoutError::Timeout) => return self.expire(deadline),
                other => other,
            },
            None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Ok(line)) => Some(Ok(line)),
            Ok(Err(err)) => {
                self.done = true;
                Some(Err(ProcessError::Io(err)))
            }
            Err(_) => self.finish(),
        }
    }
}

impl FusedIterator for OutputLines {}

impl Drop for OutputLines {
    fn drop(&mut self) {
        self.lines = None;
        if let Some(mut child) = self.child.take() {
            terminate_child(&mut child, "line iterator was dropped");
        }
        detach_reader(self.other_stream(), self.drain.take());
    }
}
