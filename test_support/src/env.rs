//! Scoped changes to the process environment.
//!
//! Configuration is read from `OUTPUTCATCHER_*` variables, so tests that set
//! them must not overlap. Hold an [`EnvLock`] for the whole test and let each
//! [`EnvVarGuard`] put the previous value back when it drops.
//!
//! ```rust,ignore
//! use test_support::env::{EnvLock, EnvVarGuard};
//!
//! let _lock = EnvLock::acquire();
//! let _timeout = EnvVarGuard::set("OUTPUTCATCHER_TIMEOUT_SECS", "5");
//! ```

use std::{
    ffi::{OsStr, OsString},
    fmt,
    sync::{Mutex, MutexGuard},
};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Holds the process-wide environment lock until dropped.
pub struct EnvLock {
    _held: MutexGuard<'static, ()>,
}

impl fmt::Debug for EnvLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvLock")
    }
}

impl EnvLock {
    /// Block until no other test is mutating the environment.
    ///
    /// A lock poisoned by a panicking test is recovered; the guards of that
    /// test have already restored its variables while unwinding.
    pub fn acquire() -> Self {
        let held = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Self { _held: held }
    }
}

/// Restores one environment variable to its earlier state on drop.
#[derive(Debug)]
pub struct EnvVarGuard {
    key: OsString,
    previous: Option<OsString>,
}

impl EnvVarGuard {
    /// Set `key` to `value` until the guard drops.
    ///
    /// The caller must hold an [`EnvLock`].
    #[must_use]
    pub fn set(key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        let guard = Self::remember(key.as_ref());
        // SAFETY: callers hold `EnvLock`, so no other test thread touches the
        // environment concurrently.
        unsafe { std::env::set_var(&guard.key, value) };
        guard
    }

    /// Unset `key` until the guard drops.
    ///
    /// The caller must hold an [`EnvLock`].
    #[must_use]
    pub fn remove(key: impl AsRef<OsStr>) -> Self {
        let guard = Self::remember(key.as_ref());
        // SAFETY: as for `set`.
        unsafe { std::env::remove_var(&guard.key) };
        guard
    }

    fn remember(key: &OsStr) -> Self {
        Self {
            key: key.to_os_string(),
            previous: std::env::var_os(key),
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        // SAFETY: the guard is dropped while its test still holds `EnvLock`.
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }
}
