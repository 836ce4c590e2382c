//! In-memory text sinks used in place of the standard streams.
//!
//! [`StreamBuffer`] accumulates text written through the [`TextSink`]
//! capability or through [`std::io::Write`]. It can escape control characters
//! as they arrive and stops accepting text once a configured character budget
//! is reached.

use std::{borrow::Cow, io, str};

use miette::Diagnostic;
use thiserror::Error;

/// Anything that can accept text and report how many characters it took.
pub trait TextSink {
    /// Append `text`, returning the number of characters accepted.
    fn write_text(&mut self, text: &str) -> usize;
}

/// Failures raised by [`StreamBuffer`] when fed through [`io::Write`].
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum SinkError {
    /// The bytes written were not valid UTF-8 text.
    #[error("stream buffers only accept text; invalid UTF-8 after {valid_up_to} bytes")]
    #[diagnostic(code(outputcatcher::sink::not_text))]
    NotText {
        /// Number of leading bytes that decoded cleanly.
        valid_up_to: usize,
    },
}

/// Construction options for a [`StreamBuffer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Store the escaped form of every write.
    pub escaped: bool,
    /// Maximum number of characters kept; `0` means unlimited.
    pub max_length: usize,
}

impl BufferOptions {
    /// Options with escaping switched on or off.
    #[must_use]
    pub const fn escaped(mut self, escaped: bool) -> Self {
        self.escaped = escaped;
        self
    }

    /// Options with the given character budget.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }
}

/// Accumulates text for a captured stream.
///
/// Once the character budget is reached the buffer is closed: every further
/// write is a no-op returning `0`.
///
/// # Examples
///
/// ```
/// use outputcatcher::sink::{BufferOptions, StreamBuffer, TextSink};
///
/// let mut buffer = StreamBuffer::new(BufferOptions::default().max_length(4));
/// assert_eq!(buffer.write_text("hello"), 4);
/// assert_eq!(buffer.content(), "hell");
/// assert!(buffer.is_truncated());
/// assert_eq!(buffer.write_text("more"), 0);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamBuffer {
    options: BufferOptions,
    content: String,
    chars: usize,
    truncated: bool,
    pending: Vec<u8>,
}

impl StreamBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new(options: BufferOptions) -> Self {
        Self {
            options,
            content: String::new(),
            chars: 0,
            truncated: false,
            pending: Vec::new(),
        }
    }

    /// The options the buffer was created with.
    #[must_use]
    pub const fn options(&self) -> BufferOptions {
        self.options
    }

    /// Captured text, already escaped when escaping is enabled.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume the buffer, returning the captured text.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }

    /// Number of characters held.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.chars
    }

    /// Whether nothing has been captured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.chars == 0
    }

    /// Whether the character budget has been reached.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Append UTF-8 bytes, returning the number of characters accepted.
    ///
    /// A multi-byte sequence split across two calls is held back until the
    /// rest of it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::NotText`] when `bytes` contain invalid UTF-8. The
    /// valid prefix is still appended.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        let mut joined = std::mem::take(&mut self.pending);
        joined.extend_from_slice(bytes);
        match str::from_utf8(&joined) {
            Ok(text) => Ok(self.write_text(text)),
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                let (head, tail) = joined.split_at(valid_up_to);
                let written = str::from_utf8(head).map_or(0, |text| self.write_text(text));
                if err.error_len().is_none() {
                    self.pending = tail.to_vec();
                    return Ok(written);
                }
                Err(SinkError::NotText { valid_up_to })
            }
        }
    }

    fn append(&mut self, piece: &str) -> usize {
        let count = piece.chars().count();
        if self.options.max_length == 0 {
            self.content.push_str(piece);
            self.chars = self.chars.saturating_add(count);
            return count;
        }
        let room = self.options.max_length.saturating_sub(self.chars);
        if count < room {
            self.content.push_str(piece);
            self.chars = self.chars.saturating_add(count);
            return count;
        }
        let end = piece
            .char_indices()
            .nth(room)
            .map_or(piece.len(), |(index, _)| index);
        self.content.push_str(piece.get(..end).unwrap_or(piece));
        self.chars = self.options.max_length;
        self.truncated = true;
        room
    }
}

impl TextSink for StreamBuffer {
    fn write_text(&mut self, text: &str) -> usize {
        if self.truncated {
            return 0;
        }
        let piece: Cow<'_, str> = if self.options.escaped {
            Cow::Owned(escape(text))
        } else {
            Cow::Borrowed(text)
        };
        self.append(&piece)
    }
}

impl io::Write for StreamBuffer {
    /// Reports the whole of `buf` as consumed, even when the budget drops it.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Render control characters, quotes, and backslashes as visible escapes.
///
/// Each character is escaped on its own, combining marks included, so
/// escaping text in pieces gives the same result as escaping it whole.
#[must_use]
pub fn escape(text: &str) -> String {
    text.chars().flat_map(char::escape_debug).collect()
}
