//! External builder backends for zilch.
//!
//! Every externally observable operation (platform query, revision lock,
//! build, activated run, search, garbage collection) is a blocking child
//! process behind the `BuildBackend` trait. The `nix` backend drives the
//! real tool; the mock backend is a deterministic in-process stand-in that
//! makes the whole engine testable without a builder installed.

pub mod backend;
pub mod mock;
pub mod nix;

pub use backend::{select_backend, BuildBackend, SearchEntry};
pub use mock::{MockBackend, MOCK_SYSTEM};
pub use nix::NixBackend;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{}", format_tool_failure(.op, .code, .stdout, .stderr))]
    Tool {
        op: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("builder produced unusable output for {op}: {detail}")]
    InvalidOutput { op: String, detail: String },
    #[error("unknown backend '{0}'")]
    BackendUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a nonzero tool exit with its captured output verbatim, so the
/// caller sees exactly what the builder said.
fn format_tool_failure(op: &str, code: &Option<i32>, stdout: &str, stderr: &str) -> String {
    let mut message = match code {
        Some(code) => format!("{op} failed with exit code {code}"),
        None => format!("{op} was terminated by a signal"),
    };
    if !stdout.trim().is_empty() {
        message.push_str("\n--- stdout ---\n");
        message.push_str(stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        message.push_str("\n--- stderr ---\n");
        message.push_str(stderr.trim_end());
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_carries_output_verbatim() {
        let err = RuntimeError::Tool {
            op: "build environment".to_owned(),
            code: Some(1),
            stdout: "partial trace\n".to_owned(),
            stderr: "error: attribute 'ghost' missing\n".to_owned(),
        };
        let text = err.to_string();
        assert!(text.contains("exit code 1"));
        assert!(text.contains("partial trace"));
        assert!(text.contains("attribute 'ghost' missing"));
    }

    #[test]
    fn signal_termination_has_no_exit_code() {
        let err = RuntimeError::Tool {
            op: "lock revisions".to_owned(),
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by a signal"));
    }
}
