//! Integration tests for the two timeout policies.

mod common;

use std::time::{Duration, Instant};

use anyhow::{Result, ensure};
use outputcatcher::process::{ProcessError, TimeoutAction};

use common::helper;

#[test]
fn child_finishing_in_time_is_unaffected() -> Result<()> {
    let completed = helper(["quick"])
        .timeout(Duration::from_secs(30))
        .run()?;
    ensure!(completed.stdout() == b"stdout: quick");
    Ok(())
}

#[test]
fn kill_policy_terminates_the_child() {
    let started = Instant::now();
    let err = helper(["--sleep-ms", "20000"])
        .timeout(Duration::from_millis(200))
        .on_timeout(TimeoutAction::Kill)
        .run()
        .expect_err("sleeping child should time out");
    let pid = match err {
        ProcessError::Timeout {
            timeout,
            pid,
            killed,
        } => {
            assert_eq!(timeout, Duration::from_millis(200));
            assert!(killed);
            pid
        }
        other => panic!("unexpected error variant: {other:?}"),
    };
    assert!(started.elapsed() < Duration::from_secs(15));

    #[cfg(unix)]
    {
        let liveness = std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .expect("run kill -0");
        assert!(!liveness.success(), "child {pid} should be gone");
    }
    #[cfg(not(unix))]
    assert!(pid > 0);
}

#[cfg(unix)]
#[test]
fn leave_policy_keeps_the_child_running() -> Result<()> {
    use std::process::Command;

    let err = helper(["--sleep-ms", "20000"])
        .timeout(Duration::from_millis(200))
        .run()
        .expect_err("sleeping child should time out");
    let ProcessError::Timeout { pid, killed, .. } = err else {
        anyhow::bail!("unexpected error variant: {err:?}");
    };
    ensure!(!killed);
    ensure!(err.to_string().contains(&pid.to_string()));

    let pid_arg = pid.to_string();
    let alive = Command::new("kill").args(["-0", &pid_arg]).status()?;
    ensure!(alive.success(), "child {pid} should still be running");
    let killed_now = Command::new("kill").arg(&pid_arg).status()?;
    ensure!(killed_now.success());
    Ok(())
}
