//! Command line interface definition using clap.
//!
//! Flags override the matching `OUTPUTCATCHER_*` environment settings. Without
//! a trailing command the binary demonstrates the stream catchers.

use std::ffi::OsString;

use clap::Parser;

use crate::config::CatcherConfig;

/// Capture the output of a command, or demonstrate the stream catchers.
#[derive(Debug, Default, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Seconds to wait for the command to exit.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Kill the command when the timeout elapses instead of leaving it running.
    #[arg(long)]
    pub kill_on_timeout: bool,

    /// Text fed to the command on stdin.
    #[arg(long, value_name = "TEXT")]
    pub input: Option<String>,

    /// Stream stdout line by line as the command produces it.
    #[arg(long)]
    pub lines: bool,

    /// Escape control characters in captured demo output.
    #[arg(long)]
    pub escaped: bool,

    /// Character budget for captured demo output.
    #[arg(long, value_name = "N")]
    pub max_length: Option<usize>,

    /// Per-stream byte ceiling on captured command output.
    #[arg(long, value_name = "BYTES")]
    pub max_capture_bytes: Option<u64>,

    /// Command to run, given after `--`.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Overlay the flags given on the command line onto `config`.
    #[must_use]
    pub fn merge_into(&self, mut config: CatcherConfig) -> CatcherConfig {
        if let Some(secs) = self.timeout {
            config.timeout_secs = Some(secs);
        }
        if self.kill_on_timeout {
            config.kill_on_timeout = true;
        }
        if self.escaped {
            config.escaped = true;
        }
        if let Some(length) = self.max_length {
            config.max_length = length;
        }
        if let Some(bytes) = self.max_capture_bytes {
            config.max_capture_bytes = Some(bytes);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["outputcatcher"], 0)]
    #[case(&["outputcatcher", "--", "echo", "hi"], 2)]
    #[case(&["outputcatcher", "--lines", "--", "cat", "-n", "--number"], 3)]
    fn trailing_command_is_collected(#[case] args: &[&str], #[case] expected: usize) {
        let cli = Cli::try_parse_from(args).expect("parse CLI");
        assert_eq!(cli.command.len(), expected);
    }

    #[test]
    fn flags_override_environment_values() {
        let env = CatcherConfig {
            timeout_secs: Some(30),
            max_length: 10,
            ..CatcherConfig::default()
        };
        let cli = Cli::try_parse_from(["outputcatcher", "--timeout", "2", "--escaped"])
            .expect("parse CLI");
        let merged = cli.merge_into(env);
        assert_eq!(merged.timeout_secs, Some(2));
        assert!(merged.escaped);
        assert_eq!(merged.max_length, 10);
    }

    #[test]
    fn unset_flags_keep_environment_values() {
        let env = CatcherConfig {
            kill_on_timeout: true,
            max_capture_bytes: Some(64),
            ..CatcherConfig::default()
        };
        let merged = Cli::default().merge_into(env.clone());
        assert_eq!(merged, env);
    }
}
