//! Spooled stdin for child processes.
//!
//! Input is staged in a [`SpooledTempFile`]: small payloads stay in memory and
//! reach the child through a pipe fed by a writer thread, larger ones spill to
//! an anonymous file that the child inherits directly as its stdin.

use std::{
    fs::File,
    io::{self, Seek, SeekFrom, Write},
    process::{ChildStdin, Stdio},
    thread,
};

use tempfile::{SpooledData, SpooledTempFile};

/// Bytes held in memory before input spills to disk.
pub const DEFAULT_SPOOL_LIMIT: usize = 64 * 1024;

/// How the child's stdin is provided.
#[derive(Debug)]
pub(super) enum ChildInput {
    /// No input: stdin is the null device.
    Null,
    /// Spooled in memory, written through a pipe after spawn.
    Piped(Vec<u8>),
    /// Spilled to disk and rewound; the child reads the file itself.
    File(File),
}

impl ChildInput {
    pub(super) fn spool(data: Option<&[u8]>, limit: usize) -> io::Result<Self> {
        let Some(bytes) = data else {
            return Ok(Self::Null);
        };
        let mut spooled = SpooledTempFile::new(limit);
        spooled.write_all(bytes)?;
        spooled.flush()?;
        spooled.seek(SeekFrom::Start(0))?;
        Ok(match spooled.into_inner() {
            SpooledData::InMemory(cursor) => Self::Piped(cursor.into_inner()),
            SpooledData::OnDisk(file) => {
                tracing::debug!(bytes = bytes.len(), limit, "stdin spilled to disk");
                Self::File(file)
            }
        })
    }

    /// Split into the `Stdio` handed to the child and any bytes still to be
    /// piped once the child is running.
    pub(super) fn into_stdio(self) -> (Stdio, Option<Vec<u8>>) {
        match self {
            Self::Null => (Stdio::null(), None),
            Self::Piped(bytes) => (Stdio::piped(), Some(bytes)),
            Self::File(file) => (Stdio::from(file), None),
        }
    }
}

pub(super) type WriterHandle = thread::JoinHandle<io::Result<()>>;

/// Feed `bytes` to the child's stdin on a background thread, closing the pipe
/// when done.
pub(super) fn spawn_stdin_writer(stdin: Option<ChildStdin>, bytes: Vec<u8>) -> Option<WriterHandle> {
    stdin.map(|mut pipe| thread::spawn(move || pipe.write_all(&bytes)))
}
