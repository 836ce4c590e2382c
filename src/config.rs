//! Layered defaults for runners and capture buffers.
//!
//! Values come from built-in defaults, then `OUTPUTCATCHER_*` environment
//! variables, then command-line flags. Environment extraction goes through the
//! `figment` providers re-exported by `ortho_config`.

use std::time::Duration;

use miette::Diagnostic;
use ortho_config::figment::{Figment, providers::Env};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    process::{ProcessOutput, TimeoutAction},
    sink::BufferOptions,
};

/// Prefix shared by every configuration environment variable.
pub const ENV_PREFIX: &str = "OUTPUTCATCHER_";

/// Failure to read configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An environment variable held a value of the wrong type.
    #[error("invalid OUTPUTCATCHER_* configuration: {0}")]
    #[diagnostic(
        code(outputcatcher::config::extract),
        help("unset the offending variable or give it a value of the right type")
    )]
    Extract(Box<ortho_config::figment::Error>),
}

/// Settings applied to [`ProcessOutput`] and [`BufferOptions`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatcherConfig {
    /// Seconds to wait for a child before reporting a timeout.
    pub timeout_secs: Option<u64>,
    /// Kill a child that outlives its timeout.
    pub kill_on_timeout: bool,
    /// Bytes of stdin kept in memory before spilling to disk.
    pub spool_limit: Option<usize>,
    /// Per-stream ceiling on buffered child output.
    pub max_capture_bytes: Option<u64>,
    /// Escape control characters in captured text.
    pub escaped: bool,
    /// Character budget for captured text; `0` means unlimited.
    pub max_length: usize,
}

impl CatcherConfig {
    /// Read configuration from `OUTPUTCATCHER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Extract`] when a variable cannot be parsed into
    /// its field's type.
    pub fn from_env() -> Result<Self, ConfigError> {
        Figment::from(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|err| ConfigError::Extract(Box::new(err)))
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// What to do when the timeout elapses.
    #[must_use]
    pub const fn timeout_action(&self) -> TimeoutAction {
        if self.kill_on_timeout {
            TimeoutAction::Kill
        } else {
            TimeoutAction::Leave
        }
    }

    /// Capture buffer options.
    #[must_use]
    pub const fn buffer_options(&self) -> BufferOptions {
        BufferOptions {
            escaped: self.escaped,
            max_length: self.max_length,
        }
    }

    /// Apply the runner settings to `runner`.
    #[must_use]
    pub fn apply(&self, runner: ProcessOutput) -> ProcessOutput {
        let mut configured = runner.on_timeout(self.timeout_action());
        if let Some(timeout) = self.timeout() {
            configured = configured.timeout(timeout);
        }
        if let Some(bytes) = self.spool_limit {
            configured = configured.spool_limit(bytes);
        }
        if let Some(bytes) = self.max_capture_bytes {
            configured = configured.capture_limit(bytes);
        }
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::env::{EnvLock, EnvVarGuard};

    #[test]
    fn defaults_are_unbounded_and_advisory() {
        let config = CatcherConfig::default();
        assert_eq!(config.timeout(), None);
        assert_eq!(config.timeout_action(), TimeoutAction::Leave);
        assert_eq!(config.buffer_options(), BufferOptions::default());
    }

    #[test]
    fn environment_values_are_read() {
        let _lock = EnvLock::acquire();
        let _timeout = EnvVarGuard::set("OUTPUTCATCHER_TIMEOUT_SECS", "5");
        let _kill = EnvVarGuard::set("OUTPUTCATCHER_KILL_ON_TIMEOUT", "true");
        let _length = EnvVarGuard::set("OUTPUTCATCHER_MAX_LENGTH", "160");
        let config = CatcherConfig::from_env().expect("read config from env");
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.timeout_action(), TimeoutAction::Kill);
        assert_eq!(config.max_length, 160);
        assert!(!config.escaped);
    }

    #[test]
    fn malformed_environment_values_are_rejected() {
        let _lock = EnvLock::acquire();
        let _timeout = EnvVarGuard::set("OUTPUTCATCHER_TIMEOUT_SECS", "soon");
        let err = CatcherConfig::from_env().expect_err("non-numeric timeout should fail");
        assert!(err.to_string().contains("invalid OUTPUTCATCHER_* configuration"));
    }
}
