//! End-to-end tests for the `outputcatcher` binary using `assert_cmd`.

use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;

const HELPER: &str = env!("CARGO_BIN_EXE_outputcatcher-helper");

fn outputcatcher() -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("outputcatcher");
    for key in [
        "OUTPUTCATCHER_TIMEOUT_SECS",
        "OUTPUTCATCHER_KILL_ON_TIMEOUT",
        "OUTPUTCATCHER_SPOOL_LIMIT",
        "OUTPUTCATCHER_MAX_CAPTURE_BYTES",
        "OUTPUTCATCHER_ESCAPED",
        "OUTPUTCATCHER_MAX_LENGTH",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn demo_prints_both_captured_streams() {
    outputcatcher()
        .assert()
        .success()
        .stdout(
            "Captured stdout: This is a test.\tYou shouldn't see it right away.\n\
             Captured stderr: Testing stderr output.\n",
        )
        .stderr("");
}

#[rstest]
#[case(&["--escaped"], "Captured stdout: This is a test.\\tYou shouldn\\'t")]
#[case(&["--max-length", "10"], "Captured stdout: This is a \nCaptured stderr: Testing st\n")]
fn demo_honours_buffer_options(#[case] args: &[&str], #[case] expected: &str) {
    outputcatcher()
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn demo_reads_options_from_the_environment() {
    outputcatcher()
        .env("OUTPUTCATCHER_ESCAPED", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("This is a test.\\tYou"));
}

#[test]
fn command_output_is_forwarded() {
    outputcatcher()
        .args(["--", HELPER, "-b", "hi"])
        .assert()
        .success()
        .stdout("stdout: hi\n")
        .stderr(predicate::str::contains("stderr: hi"));
}

#[test]
fn input_is_fed_to_the_command() {
    outputcatcher()
        .args(["--input", "hello", "--", HELPER, "-i"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn lines_mode_streams_stdout() {
    outputcatcher()
        .args(["--lines", "--", HELPER, "-b", "--repeat", "3", "x"])
        .assert()
        .success()
        .stdout("stdout: x\nstdout: x\nstdout: x\n")
        .stderr(predicate::str::contains("stderr: x"));
}

#[test]
fn child_exit_code_is_propagated() {
    outputcatcher()
        .args(["--", HELPER, "--exit", "5"])
        .assert()
        .code(5);
}

#[rstest]
#[case(&["--", "outputcatcher-no-such-program"], 127)]
#[case(&["--timeout", "1", "--kill-on-timeout", "--", HELPER, "--sleep-ms", "20000"], 124)]
#[case(&["--max-capture-bytes", "10", "--", HELPER, "--repeat", "100"], 4)]
#[case(&["--lines", "--timeout", "1", "--kill-on-timeout", "--", HELPER, "--sleep-ms", "20000"], 124)]
#[case(&["--no-such-flag"], 2)]
fn failures_map_to_exit_codes(#[case] args: &[&str], #[case] code: i32) {
    outputcatcher().args(args).assert().code(code);
}

#[test]
fn invalid_environment_configuration_is_rejected() {
    outputcatcher()
        .env("OUTPUTCATCHER_TIMEOUT_SECS", "soon")
        .assert()
        .code(78)
        .stderr(predicate::str::contains("invalid OUTPUTCATCHER_* configuration"));
}
