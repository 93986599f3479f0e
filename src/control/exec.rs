//! External tool invocation with a bounded wall-clock timeout.

use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::core::errors::{Result, SvcError};

/// Hard ceiling on any single external tool call.
pub(crate) const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured output of one tool invocation.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl ToolOutput {
    /// Stdout and stderr concatenated, for substring matching: the native
    /// tools are inconsistent about which stream errors land on.
    pub(crate) fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Run `tool` with `args`, collecting stdout/stderr, bounded by
/// [`TOOL_TIMEOUT`].
///
/// The child is drained on a worker thread; on timeout the thread (and the
/// child) are left to finish on their own — in-flight subprocesses are not
/// killed.
pub(crate) fn run_tool(tool: &'static str, args: &[&str]) -> Result<ToolOutput> {
    let owned: Vec<String> = args.iter().map(ToString::to_string).collect();
    debug!(tool, args = %owned.join(" "), "running external tool");

    let (sender, receiver) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let result = Command::new(tool).args(&owned).output();
        let _ = sender.send(result);
    });

    match receiver.recv_timeout(TOOL_TIMEOUT) {
        Ok(Ok(output)) => {
            let tool_output = ToolOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                code: output.status.code(),
                success: output.status.success(),
            };
            debug!(
                tool,
                code = ?tool_output.code,
                stdout = %tool_output.stdout.trim(),
                stderr = %tool_output.stderr.trim(),
                "external tool finished"
            );
            Ok(tool_output)
        }
        Ok(Err(source)) => Err(SvcError::Tool {
            tool,
            details: format!("failed to launch: {source}"),
        }),
        Err(_) => Err(SvcError::Tool {
            tool,
            details: format!("timed out after {}s", TOOL_TIMEOUT.as_secs()),
        }),
    }
}

/// Build a transport error from a failed tool invocation.
pub(crate) fn tool_failure(tool: &'static str, args: &[&str], output: &ToolOutput) -> SvcError {
    SvcError::Tool {
        tool,
        details: format!(
            "{} {} failed (exit {}): {}",
            tool,
            args.join(" "),
            output.code.unwrap_or(-1),
            output.combined().trim()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_joins_both_streams() {
        let output = ToolOutput {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            code: Some(0),
            success: true,
        };
        assert_eq!(output.combined(), "out\nerr");

        let only_err = ToolOutput {
            stdout: String::new(),
            stderr: "err".to_string(),
            code: Some(1),
            success: false,
        };
        assert_eq!(only_err.combined(), "err");
    }

    #[test]
    #[cfg(unix)]
    fn run_tool_captures_output_and_status() {
        let output = run_tool("echo", &["hello"]).expect("echo should run");
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn run_tool_reports_nonzero_exit() {
        let output = run_tool("false", &[]).expect("false should run");
        assert!(!output.success);
    }

    #[test]
    fn run_tool_maps_missing_binary_to_transport_error() {
        let error = run_tool("definitely-not-a-real-tool-xyz", &[]).unwrap_err();
        assert!(matches!(error, SvcError::Tool { .. }));
        assert!(error.is_transport());
    }

    #[test]
    fn tool_failure_includes_command_line_and_output() {
        let output = ToolOutput {
            stdout: String::new(),
            stderr: "no such unit".to_string(),
            code: Some(5),
            success: false,
        };
        let error = tool_failure("systemctl", &["start", "svc-a"], &output);
        let message = error.to_string();
        assert!(message.contains("systemctl start svc-a"));
        assert!(message.contains("exit 5"));
        assert!(message.contains("no such unit"));
    }
}
