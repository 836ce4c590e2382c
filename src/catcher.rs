//! Scoped redirection of stdout and stderr into [`StreamBuffer`]s.
//!
//! Rather than swapping process-global handles, callers thread an
//! [`OutputContext`] through the code whose output they want to observe. The
//! context starts out bound to the real OS streams; [`OutputContext::catch_stdout`]
//! and [`OutputContext::catch_stderr`] install a buffer for the lifetime of the
//! returned [`Capture`] guard.
//!
//! ```
//! use std::io::Write;
//! use outputcatcher::{catcher::OutputContext, sink::BufferOptions};
//!
//! let mut context = OutputContext::default();
//! let mut out = context.catch_stdout(BufferOptions::default());
//! let mut err = out.catch_stderr(BufferOptions::default());
//! write!(err.stdout(), "to stdout").expect("write stdout");
//! write!(err.stderr(), "to stderr").expect("write stderr");
//! assert_eq!(err.finish().content(), "to stderr");
//! assert_eq!(out.finish().content(), "to stdout");
//! assert!(context.stdout().is_os());
//! ```

use std::{
    fmt,
    io::{self, Write},
    mem,
    ops::{Deref, DerefMut},
};

use crate::sink::{BufferOptions, StreamBuffer, TextSink};

/// Which standard stream a binding stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl Stream {
    /// Lower-case stream name.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Where writes for one stream currently go.
#[derive(Debug)]
pub enum Binding {
    /// The real process stream.
    Os(Stream),
    /// An in-memory buffer.
    Buffer(StreamBuffer),
}

impl Binding {
    /// Whether the binding points at the real OS stream.
    #[must_use]
    pub const fn is_os(&self) -> bool {
        matches!(self, Self::Os(_))
    }

    /// Borrow the buffer when the stream is being captured.
    #[must_use]
    pub const fn buffer(&self) -> Option<&StreamBuffer> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            Self::Os(_) => None,
        }
    }
}

impl io::Write for Binding {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Os(Stream::Stdout) => io::stdout().write(buf),
            Self::Os(Stream::Stderr) => io::stderr().write(buf),
            Self::Buffer(buffer) => buffer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Os(Stream::Stdout) => io::stdout().flush(),
            Self::Os(Stream::Stderr) => io::stderr().flush(),
            Self::Buffer(buffer) => buffer.flush(),
        }
    }
}

impl TextSink for Binding {
    fn write_text(&mut self, text: &str) -> usize {
        match self {
            Self::Buffer(buffer) => buffer.write_text(text),
            Self::Os(_) => {
                if let Err(err) = self.write_all(text.as_bytes()) {
                    tracing::debug!(error = %err, "write to OS stream failed");
                    return 0;
                }
                text.chars().count()
            }
        }
    }
}

/// The current stdout and stderr bindings.
#[derive(Debug)]
pub struct OutputContext {
    stdout: Binding,
    stderr: Binding,
}

impl Default for OutputContext {
    fn default() -> Self {
        Self {
            stdout: Binding::Os(Stream::Stdout),
            stderr: Binding::Os(Stream::Stderr),
        }
    }
}

impl OutputContext {
    /// The binding standing in for stdout.
    pub const fn stdout(&mut self) -> &mut Binding {
        &mut self.stdout
    }

    /// The binding standing in for stderr.
    pub const fn stderr(&mut self) -> &mut Binding {
        &mut self.stderr
    }

    const fn slot(&mut self, target: Stream) -> &mut Binding {
        match target {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }

    /// Capture stdout until the returned guard is finished or dropped.
    pub fn catch_stdout(&mut self, options: BufferOptions) -> Capture<'_> {
        Capture::install(self, Stream::Stdout, options)
    }

    /// Capture stderr until the returned guard is finished or dropped.
    pub fn catch_stderr(&mut self, options: BufferOptions) -> Capture<'_> {
        Capture::install(self, Stream::Stderr, options)
    }

    /// Run `body` with stdout captured, returning its result and the buffer.
    pub fn with_stdout_caught<R>(
        &mut self,
        options: BufferOptions,
        body: impl FnOnce(&mut Self) -> R,
    ) -> (R, StreamBuffer) {
        let mut capture = self.catch_stdout(options);
        let result = body(&mut capture);
        (result, capture.finish())
    }

    /// Run `body` with stderr captured, returning its result and the buffer.
    pub fn with_stderr_caught<R>(
        &mut self,
        options: BufferOptions,
        body: impl FnOnce(&mut Self) -> R,
    ) -> (R, StreamBuffer) {
        let mut capture = self.catch_stderr(options);
        let result = body(&mut capture);
        (result, capture.finish())
    }
}

/// Guard holding a stream redirected into a buffer.
///
/// Dereferences to the [`OutputContext`] so code inside the scope, including
/// nested captures, writes through it. Dropping the guard restores the
/// previous binding and discards the buffer; [`Capture::finish`] restores it
/// and hands the buffer back.
#[derive(Debug)]
pub struct Capture<'a> {
    context: &'a mut OutputContext,
    target: Stream,
    previous: Option<Binding>,
}

impl<'a> Capture<'a> {
    fn install(context: &'a mut OutputContext, target: Stream, options: BufferOptions) -> Self {
        let buffer = Binding::Buffer(StreamBuffer::new(options));
        let previous = mem::replace(context.slot(target), buffer);
        tracing::debug!(stream = %target, "stream capture installed");
        Self {
            context,
            target,
            previous: Some(previous),
        }
    }

    /// The stream this guard captures.
    #[must_use]
    pub const fn target(&self) -> Stream {
        self.target
    }

    /// Restore the previous binding and return the captured buffer.
    #[must_use]
    pub fn finish(mut self) -> StreamBuffer {
        self.restore().unwrap_or_default()
    }

    fn restore(&mut self) -> Option<StreamBuffer> {
        let previous = self.previous.take()?;
        let installed = mem::replace(self.context.slot(self.target), previous);
        tracing::debug!(stream = %self.target, "stream capture restored");
        match installed {
            Binding::Buffer(buffer) => Some(buffer),
            Binding::Os(_) => None,
        }
    }
}

impl Deref for Capture<'_> {
    type Target = OutputContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for Capture<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for Capture<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.restore() {
            tracing::debug!(stream = %self.target, chars = buffer.len(), "discarding captured output");
        }
    }
}
