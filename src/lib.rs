//! Output capture for in-process streams and child processes.
//!
//! - [`sink`] provides [`StreamBuffer`](sink::StreamBuffer), an in-memory text
//!   sink with optional escaping and a character budget.
//! - [`catcher`] redirects stdout or stderr into such a buffer for the
//!   duration of a scope, through an explicit [`OutputContext`](catcher::OutputContext).
//! - [`process`] runs a child process and collects its stdout and stderr
//!   without risking a pipe deadlock.
//! - [`config`], [`cli`], and [`runner`] back the `outputcatcher` binary.

pub mod catcher;
pub mod cli;
pub mod config;
pub mod process;
pub mod runner;
pub mod sink;
