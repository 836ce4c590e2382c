//! Behaviour of the `outputcatcher` binary.
//!
//! Without a command the runner demonstrates both stream catchers. With one it
//! runs the command through [`ProcessOutput`], forwards what it captured, and
//! reports the child's exit code.

mod error;

pub use error::{
    EXIT_BROKEN_PIPE, EXIT_CONFIG, EXIT_NOT_FOUND, EXIT_OUTPUT_LIMIT, EXIT_SPAWN, EXIT_TIMEOUT,
    RunnerError,
};

use std::{
    io::{self, Write},
    process::{ExitCode, ExitStatus},
};

use crate::{
    catcher::OutputContext,
    cli::Cli,
    config::CatcherConfig,
    process::ProcessOutput,
    sink::TextSink,
};

const DEMO_STDOUT: &str = "This is a test.\tYou shouldn't see it right away.";
const DEMO_STDERR: &str = "Testing stderr output.";

/// Execute the parsed [`Cli`].
///
/// # Errors
///
/// Returns a [`RunnerError`] when configuration is invalid, the command
/// cannot be run, or its output cannot be forwarded.
pub fn run(cli: &Cli) -> Result<ExitCode, RunnerError> {
    let config = cli.merge_into(CatcherConfig::from_env()?);
    tracing::debug!(?config, "resolved configuration");
    if cli.command.is_empty() {
        return demonstrate(&config);
    }
    let mut runner = config.apply(ProcessOutput::new(cli.command.iter().cloned()));
    if let Some(input) = &cli.input {
        runner = runner.stdin_data(input.as_str());
    }
    if cli.lines {
        stream_lines(&runner)
    } else {
        forward_buffered(runner)
    }
}

/// Capture one line on each stream and print what was caught.
fn demonstrate(config: &CatcherConfig) -> Result<ExitCode, RunnerError> {
    let options = config.buffer_options();
    let mut context = OutputContext::default();
    let ((), caught_out) = context.with_stdout_caught(options, |ctx| {
        ctx.stdout().write_text(DEMO_STDOUT);
    });
    let ((), caught_err) = context.with_stderr_caught(options, |ctx| {
        ctx.stderr().write_text(DEMO_STDERR);
    });

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Captured stdout: {}", caught_out.content()).map_err(RunnerError::Output)?;
    writeln!(stdout, "Captured stderr: {}", caught_err.content()).map_err(RunnerError::Output)?;
    stdout.flush().map_err(RunnerError::Output)?;
    Ok(ExitCode::SUCCESS)
}

fn forward_buffered(runner: ProcessOutput) -> Result<ExitCode, RunnerError> {
    let completed = runner.run()?;
    write_block(&mut io::stdout().lock(), completed.stdout())?;
    write_block(&mut io::stderr().lock(), completed.stderr())?;
    Ok(exit_code_for(completed.status()))
}

fn stream_lines(runner: &ProcessOutput) -> Result<ExitCode, RunnerError> {
    let mut lines = runner.iter_stdout()?;
    {
        let mut stdout = io::stdout().lock();
        for item in lines.by_ref() {
            let line = item?;
            stdout.write_all(&line).map_err(RunnerError::Output)?;
            stdout.write_all(b"\n").map_err(RunnerError::Output)?;
            stdout.flush().map_err(RunnerError::Output)?;
        }
    }
    write_block(&mut io::stderr().lock(), lines.drained())?;
    Ok(lines.exit_status().map_or(ExitCode::FAILURE, exit_code_for))
}

/// Write captured bytes followed by the newline line-joining removed.
fn write_block(out: &mut impl Write, bytes: &[u8]) -> Result<(), RunnerError> {
    if bytes.is_empty() {
        return Ok(());
    }
    out.write_all(bytes)
        .and_then(|()| out.write_all(b"\n"))
        .and_then(|()| out.flush())
        .map_err(RunnerError::Output)
}

/// Map the child's status onto ours; signal deaths become a plain failure.
fn exit_code_for(status: ExitStatus) -> ExitCode {
    status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}
