//! Pipe reader management for child output.
//!
//! Each output pipe is drained on its own thread so a child blocked on a full
//! stderr pipe can never stall a reader waiting on stdout, or the reverse.

use std::{
    io::{self, BufRead, BufReader, Read},
    sync::mpsc,
    thread,
};

use super::error::ProcessError;
use crate::catcher::Stream;

pub(super) type ReaderHandle = thread::JoinHandle<Result<Vec<u8>, ProcessError>>;
pub(super) type LineFeed = mpsc::Receiver<io::Result<Vec<u8>>>;

/// Lines buffered between a feed thread and its consumer before the thread
/// stops reading and the child's pipe starts to fill.
const LINE_BACKLOG: usize = 64;

/// What a reader thread drains and how much it may keep.
#[derive(Clone, Copy, Debug)]
pub(super) struct PipeSpec {
    stream: Stream,
    limit: Option<u64>,
}

impl PipeSpec {
    pub(super) const fn new(stream: Stream, limit: Option<u64>) -> Self {
        Self { stream, limit }
    }

    pub(super) const fn stream(self) -> Stream {
        self.stream
    }

    const fn into_limit(self) -> PipeLimit {
        PipeLimit {
            spec: self,
            consumed: 0,
        }
    }
}

struct PipeLimit {
    spec: PipeSpec,
    consumed: u64,
}

impl PipeLimit {
    fn record(&mut self, read: usize) -> Result<(), ProcessError> {
        let bytes = u64::try_from(read)
            .map_err(|_| ProcessError::Io(io::Error::other("pipe read size overflow")))?;
        let new_total = self
            .consumed
            .checked_add(bytes)
            .ok_or_else(|| ProcessError::Io(io::Error::other("pipe output size overflow")))?;
        if let Some(limit) = self.spec.limit
            && new_total > limit
        {
            return Err(ProcessError::OutputLimit {
                stream: self.spec.stream,
                limit,
            });
        }
        self.consumed = new_total;
        Ok(())
    }
}

/// Read one line, without its `\n` or `\r\n` terminator.
///
/// Returns `None` at end of stream.
pub(super) fn next_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

/// Drain `reader` line by line, rejoining the lines with single `\n`s.
///
/// When the limit is exceeded the rest of the stream is still consumed so the
/// child never blocks on a full pipe; the limit error is reported at the end.
pub(super) fn read_lines<R: Read>(pipe: R, spec: PipeSpec) -> Result<Vec<u8>, ProcessError> {
    let mut reader = BufReader::new(pipe);
    let mut limit = spec.into_limit();
    let mut joined = Vec::new();
    let mut exceeded = None;
    let mut first = true;
    while let Some(line) = next_line(&mut reader)? {
        if exceeded.is_some() {
            continue;
        }
        let separator = usize::from(!first);
        if let Err(err) = limit.record(line.len().saturating_add(separator)) {
            tracing::debug!(stream = %spec.stream(), "capture limit reached; draining remainder");
            exceeded = Some(err);
            continue;
        }
        if !first {
            joined.push(b'\n');
        }
        joined.extend_from_slice(&line);
        first = false;
    }
    exceeded.map_or(Ok(joined), Err)
}

pub(super) fn spawn_line_reader<R>(pipe: Option<R>, spec: PipeSpec) -> Option<ReaderHandle>
where
    R: Read + Send + 'static,
{
    pipe.map(|reader| thread::spawn(move || read_lines(reader, spec)))
}

/// Read `pipe` line by line on a background thread, handing each line over a
/// bounded channel.
///
/// The channel disconnects at end of stream, after a read error, or once the
/// receiver is gone.
pub(super) fn spawn_line_feed<R>(pipe: R) -> LineFeed
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(LINE_BACKLOG);
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        while let Some(item) = next_line(&mut reader).transpose() {
            let failed = item.is_err();
            if sender.send(item).is_err() || failed {
                break;
            }
        }
    });
    receiver
}

pub(super) fn join_reader(handle: Option<ReaderHandle>) -> Result<Vec<u8>, ProcessError> {
    match handle {
        Some(join_handle) => join_handle
            .join()
            .map_err(|_| ProcessError::Io(io::Error::other("pipe reader panicked")))?,
        None => Ok(Vec::new()),
    }
}

/// Let a reader thread run to completion on its own.
///
/// Used when the child may still be alive (a timeout it was left to outlive,
/// or a grandchild holding the write end of the pipe) and joining could block
/// indefinitely.
pub(super) fn detach_reader(label: Stream, handle: Option<ReaderHandle>) {
    if let Some(join_handle) = handle {
        tracing::debug!(stream = %label, "detaching pipe reader");
        drop(join_handle);
    }
}

pub(super) fn handle_stdin_result(
    stdin_handle: Option<thread::JoinHandle<io::Result<()>>>,
    status: Option<i32>,
    stderr: &[u8],
) -> Result<(), ProcessError> {
    let Some(handle) = stdin_handle else {
        return Ok(());
    };

    match handle.join() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            if err.kind() == io::ErrorKind::BrokenPipe {
                if status == Some(0) {
                    tracing::debug!("child exited successfully without reading all input");
                    return Ok(());
                }
                return Err(ProcessError::BrokenPipe {
                    source: err,
                    status,
                    stderr: stderr.to_vec(),
                });
            }
            Err(ProcessError::Io(err))
        }
        Err(_) => Err(ProcessError::Io(io::Error::other("stdin writer panicked"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn drain(input: &[u8], limit: Option<u64>) -> Result<Vec<u8>, ProcessError> {
        read_lines(
            Cursor::new(input.to_vec()),
            PipeSpec::new(Stream::Stdout, limit),
        )
    }

    #[rstest]
    #[case(b"", b"")]
    #[case(b"stdout: hello\n", b"stdout: hello")]
    #[case(b"no newline", b"no newline")]
    #[case(b"a\r\nb\nc\r\n", b"a\nb\nc")]
    #[case(b"a\n\nb\n", b"a\n\nb")]
    #[case(b"keep\rinner\n", b"keep\rinner")]
    fn lines_are_stripped_and_rejoined(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(drain(input, None).expect("drain pipe"), expected);
    }

    #[test]
    fn binary_bytes_survive() {
        let payload = [0_u8, 1, 2, 255, b'x', 0];
        assert_eq!(drain(&payload, None).expect("drain pipe"), payload);
    }

    #[test]
    fn capture_within_limit_succeeds() {
        assert_eq!(
            drain(b"payload\n", Some(7)).expect("within limit"),
            b"payload"
        );
    }

    #[test]
    fn capture_beyond_limit_reports_the_stream() {
        let err = drain(b"0123456789\nmore\n", Some(8)).expect_err("limit should trip");
        match err {
            ProcessError::OutputLimit { stream, limit } => {
                assert_eq!(stream, Stream::Stdout);
                assert_eq!(limit, 8);
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn next_line_reports_end_of_stream() {
        let mut reader = Cursor::new(b"one\r\ntwo".to_vec());
        assert_eq!(next_line(&mut reader).expect("line"), Some(b"one".to_vec()));
        assert_eq!(next_line(&mut reader).expect("line"), Some(b"two".to_vec()));
        assert_eq!(next_line(&mut reader).expect("eof"), None);
    }

    #[test]
    fn line_feed_delivers_lines_then_disconnects() {
        let feed = spawn_line_feed(Cursor::new(b"one\r\ntwo\n".to_vec()));
        let lines: Vec<_> = feed.iter().map(|item| item.expect("line")).collect();
        assert_eq!(lines, [b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn broken_stdin_is_tolerated_after_success() {
        let handle = thread::spawn(|| Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")));
        assert!(handle_stdin_result(Some(handle), Some(0), b"").is_ok());
    }

    #[test]
    fn broken_stdin_is_reported_after_failure() {
        let handle = thread::spawn(|| Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")));
        let err = handle_stdin_result(Some(handle), Some(2), b"oops").expect_err("broken pipe");
        assert!(matches!(
            err,
            ProcessError::BrokenPipe {
                status: Some(2),
                ..
            }
        ));
    }
}
