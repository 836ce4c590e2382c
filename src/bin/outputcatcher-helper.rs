//! Child process used to exercise `ProcessOutput`.
//!
//! Writes `stdout: <message>` and/or `stderr: <message>` lines, echoes its
//! stdin, prints an environment variable, sleeps, or exits with a chosen
//! status, so every capture path can be driven without platform tools.

use std::{
    env,
    io::{self, Read, Write},
    process::ExitCode,
    thread,
    time::Duration,
};

use clap::Parser;

const DEFAULT_MESSAGE: &str = "ProcessOutput Test Helper test line.";

#[derive(Debug, Parser)]
#[command(about = "Write predictable output for capture tests")]
struct Args {
    /// Write to stdout (the default when no stream is chosen).
    #[arg(short = 'o', long)]
    stdout: bool,
    /// Write to stderr.
    #[arg(short = 'e', long)]
    stderr: bool,
    /// Write to both streams.
    #[arg(short = 'b', long)]
    both: bool,
    /// Echo stdin verbatim to the chosen streams instead of a message.
    #[arg(short = 'i', long)]
    stdin: bool,
    /// Number of times to write the message.
    #[arg(long, default_value_t = 1)]
    repeat: usize,
    /// Sleep before writing anything.
    #[arg(long, value_name = "MS")]
    sleep_ms: Option<u64>,
    /// Print the value of an environment variable on stdout.
    #[arg(long, value_name = "NAME")]
    env: Option<String>,
    /// Status to exit with.
    #[arg(long, default_value_t = 0)]
    exit: u8,
    /// Message text.
    message: Vec<String>,
}

impl Args {
    const fn to_stdout(&self) -> bool {
        self.stdout || self.both || !self.stderr
    }

    const fn to_stderr(&self) -> bool {
        self.stderr || self.both
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match emit(&args) {
        Ok(()) => ExitCode::from(args.exit),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => ExitCode::from(3),
        Err(err) => {
            writeln!(io::stderr(), "outputcatcher-helper: {err}").ok();
            ExitCode::FAILURE
        }
    }
}

fn emit(args: &Args) -> io::Result<()> {
    if let Some(ms) = args.sleep_ms {
        thread::sleep(Duration::from_millis(ms));
    }
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    if let Some(name) = &args.env {
        let value = env::var_os(name).unwrap_or_default();
        writeln!(stdout, "{}", value.to_string_lossy())?;
        return stdout.flush();
    }

    if args.stdin {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        if args.to_stdout() {
            stdout.write_all(&data)?;
        }
        if args.to_stderr() {
            stderr.write_all(&data)?;
        }
        stdout.flush()?;
        return stderr.flush();
    }

    let message = if args.message.is_empty() {
        DEFAULT_MESSAGE.to_owned()
    } else {
        args.message.join(" ")
    };
    for _ in 0..args.repeat {
        if args.to_stdout() {
            writeln!(stdout, "stdout: {message}")?;
        }
        if args.to_stderr() {
            writeln!(stderr, "stderr: {message}")?;
        }
    }
    stdout.flush()?;
    stderr.flush()
}
