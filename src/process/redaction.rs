//! Redaction of secrets in logged command lines.

use std::ffi::OsString;

const SENSITIVE_KEYS: [&str; 7] = [
    "password",
    "token",
    "secret",
    "api_key",
    "apikey",
    "auth",
    "authorization",
];

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|candidate| key.eq_ignore_ascii_case(candidate))
}

/// Redact the value of a `key=value` argument whose key names a secret.
fn redact_argument(arg: &str) -> String {
    match arg.split_once('=') {
        Some((key, _)) if is_sensitive_key(key.trim()) => {
            format!("{}=***REDACTED***", key.trim())
        }
        _ => arg.to_owned(),
    }
}

/// Render a command line for logging with secrets masked.
pub(super) fn display_command_line(command_line: &[OsString]) -> String {
    command_line
        .iter()
        .map(|arg| redact_argument(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}
