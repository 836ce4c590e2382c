//! Helpers shared by the `outputcatcher` test suites.
//!
//! Provides scratch executables for spawn-failure and line-ending tests, and
//! the environment guards in [`env`].

pub mod env;

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};
use tempfile::TempDir;

/// Write a `/bin/sh` script called `name` with `body` into a fresh temporary
/// directory and mark it executable.
///
/// Returns the directory, which must be kept alive, and the script path.
///
/// # Errors
///
/// Returns any I/O error raised while creating the script.
pub fn fake_script(name: &str, body: &str) -> io::Result<(TempDir, PathBuf)> {
    let (dir, path) = plain_file(name, &format!("#!/bin/sh\n{body}\n"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }
    Ok((dir, path))
}

/// Write `contents` to a file called `name` without execute permission.
///
/// Spawning the result fails with a permission error rather than
/// "not found".
///
/// # Errors
///
/// Returns any I/O error raised while creating the file.
pub fn plain_file(name: &str, contents: &str) -> io::Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok((dir, path))
}
