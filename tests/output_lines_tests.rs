//! Integration tests for lazy line iteration over one child stream.

mod common;

use std::time::{Duration, Instant};

use anyhow::{Result, ensure};
use outputcatcher::{
    catcher::Stream,
    process::{ProcessError, TimeoutAction},
};
use rstest::rstest;

use common::helper;

#[rstest]
#[case(&["-i"], Stream::Stdout)]
#[case(&["-i", "-e"], Stream::Stderr)]
fn lines_arrive_without_terminators(#[case] flags: &[&str], #[case] stream: Stream) -> Result<()> {
    let runner = helper(flags.iter().copied()).stdin_data("a\nb\r\nc\n");
    let lines = match stream {
        Stream::Stdout => runner.iter_stdout()?,
        Stream::Stderr => runner.iter_stderr()?,
    };
    ensure!(lines.stream() == stream);
    let collected = lines.collect::<Result<Vec<_>, _>>()?;
    ensure!(collected == [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    Ok(())
}

#[test]
fn other_stream_is_drained_in_the_background() -> Result<()> {
    let mut lines = helper(["-b", "--repeat", "20000", "hi"]).iter_stdout()?;
    let mut count = 0_usize;
    for item in lines.by_ref() {
        ensure!(item? == b"stdout: hi");
        count += 1;
    }
    ensure!(count == 20000, "got {count} lines");
    ensure!(lines.drained().split(|&b| b == b'\n').count() == 20000);
    ensure!(lines.exit_status().is_some_and(|status| status.success()));
    Ok(())
}

#[test]
fn iterator_is_fused_after_the_last_line() -> Result<()> {
    let mut lines = helper(["one"]).iter_stdout()?;
    ensure!(lines.next().transpose()?.as_deref() == Some(b"stdout: one".as_slice()));
    ensure!(lines.next().is_none());
    ensure!(lines.next().is_none());
    Ok(())
}

#[test]
fn dropping_early_does_not_hang() -> Result<()> {
    let started = Instant::now();
    let mut lines = helper(["-b", "--repeat", "1000000"]).iter_stdout()?;
    let first = lines.next().transpose()?;
    ensure!(first.is_some());
    drop(lines);
    ensure!(started.elapsed() < Duration::from_secs(30));
    Ok(())
}

#[rstest]
#[case(TimeoutAction::Kill, true)]
#[case(TimeoutAction::Leave, false)]
fn timeout_bounds_a_silent_child(
    #[case] action: TimeoutAction,
    #[case] expect_killed: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut lines = helper(["--sleep-ms", "10000"])
        .timeout(Duration::from_millis(200))
        .on_timeout(action)
        .iter_stdout()?;
    let pid = match lines.next() {
        Some(Err(ProcessError::Timeout {
            timeout,
            pid,
            killed,
        })) => {
            ensure!(timeout == Duration::from_millis(200));
            ensure!(killed == expect_killed, "killed was {killed}");
            pid
        }
        other => anyhow::bail!("expected a timeout, got {other:?}"),
    };
    ensure!(
        started.elapsed() < Duration::from_secs(5),
        "timeout took {:?}",
        started.elapsed()
    );
    ensure!(lines.next().is_none());
    drop(lines);
    ensure!(pid > 0);
    #[cfg(unix)]
    {
        let pid_arg = pid.to_string();
        let alive = std::process::Command::new("kill")
            .args(["-0", &pid_arg])
            .status()?
            .success();
        ensure!(alive != expect_killed, "child {pid} alive={alive}");
        if alive {
            std::process::Command::new("kill").arg(&pid_arg).status()?;
        }
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn deadline_still_applies_after_early_lines() -> Result<()> {
    let script = "echo first; exec sleep 10";
    let (_dir, path) = test_support::fake_script("slow", script)?;
    let mut lines = outputcatcher::process::ProcessOutput::new([path])
        .timeout(Duration::from_millis(500))
        .on_timeout(TimeoutAction::Kill)
        .iter_stdout()?;
    ensure!(lines.next().transpose()?.as_deref() == Some(b"first".as_slice()));
    ensure!(matches!(
        lines.next(),
        Some(Err(ProcessError::Timeout { killed: true, .. }))
    ));
    Ok(())
}

#[cfg(unix)]
#[rstest]
#[case(Stream::Stdout, b"OUT_BYTES".as_slice(), b"ERR_BYTES".as_slice())]
#[case(Stream::Stderr, b"ERR_BYTES".as_slice(), b"".as_slice())]
fn broken_input_pipe_reports_stderr_only(
    #[case] stream: Stream,
    #[case] yielded: &[u8],
    #[case] reported: &[u8],
) -> Result<()> {
    let script = "exec 0<&-; echo OUT_BYTES; echo ERR_BYTES >&2; exit 3";
    let (_dir, path) = test_support::fake_script("closes-stdin", script)?;
    let payload = vec![b'x'; 4 << 20];
    let runner = outputcatcher::process::ProcessOutput::new([path])
        .spool_limit(8 << 20)
        .stdin_data(payload);
    let lines = match stream {
        Stream::Stdout => runner.iter_stdout()?,
        Stream::Stderr => runner.iter_stderr()?,
    };
    let items: Vec<_> = lines.collect();
    let Some((last, rest)) = items.split_last() else {
        anyhow::bail!("iterator yielded nothing");
    };
    ensure!(rest.len() == 1, "got {} lines", rest.len());
    ensure!(matches!(rest.first(), Some(Ok(line)) if line == yielded));
    match last {
        Err(ProcessError::BrokenPipe { status, stderr, .. }) => {
            ensure!(*status == Some(3));
            ensure!(stderr == reported, "stderr was {stderr:?}");
        }
        other => anyhow::bail!("expected a broken pipe, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_program_fails_before_iterating() {
    let result = outputcatcher::process::ProcessOutput::new(["does-not-exist-xyz"]).iter_stderr();
    assert!(matches!(result, Err(ProcessError::NotFound { .. })));
}

#[test]
fn capture_limit_ignores_the_iterated_stream() -> Result<()> {
    let lines = helper(["--repeat", "1000"])
        .capture_limit(100)
        .iter_stdout()?;
    let collected = lines.collect::<Result<Vec<_>, _>>()?;
    ensure!(collected.len() == 1000);
    Ok(())
}

#[test]
fn capture_limit_applies_to_the_drained_stream() -> Result<()> {
    let lines = helper(["-e", "--repeat", "1000"])
        .capture_limit(100)
        .iter_stdout()?;
    let last = lines.last();
    ensure!(
        matches!(last, Some(Err(ProcessError::OutputLimit { stream: Stream::Stderr, limit: 100 }))),
        "last item was {last:?}"
    );
    Ok(())
}
