//! Shared fixtures for the integration tests.

use std::ffi::OsString;

use outputcatcher::process::ProcessOutput;

/// Path of the helper binary built alongside the tests.
pub const HELPER: &str = env!("CARGO_BIN_EXE_outputcatcher-helper");

/// A runner for the helper binary with `args`.
pub fn helper<I, S>(args: I) -> ProcessOutput
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    ProcessOutput::new(std::iter::once(OsString::from(HELPER)).chain(args.into_iter().map(Into::into)))
}
