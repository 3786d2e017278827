use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use super::{CommandExecutor, CommandInvocation, CommandOutcome, CommandOutput};

/// Spawns real processes. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for CommandRunner {
    async fn run(&self, command: &[String], timeout: Duration) -> CommandInvocation {
        let outcome = execute(command, timeout).await;
        CommandInvocation {
            command: command.to_vec(),
            timeout,
            outcome,
        }
    }
}

async fn execute(command: &[String], timeout: Duration) -> CommandOutcome {
    let Some((program, args)) = command.split_first() else {
        return CommandOutcome::ExecutionFailed { message: "empty command".to_string() };
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            debug!(program = %program, error = %e, "Failed to spawn command");
            return CommandOutcome::ExecutionFailed { message: e.to_string() };
        }
    };

    // Dropping the future on timeout drops the child, which kills and reaps it
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutcome::Completed(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        }),
        Ok(Err(e)) => CommandOutcome::ExecutionFailed { message: e.to_string() },
        Err(_) => {
            warn!(program = %program, timeout_secs = timeout.as_secs_f64(), "Command timed out");
            CommandOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let inv = CommandRunner::new()
            .run(&cmd(&["sh", "-c", "echo hello; echo oops >&2; exit 3"]), Duration::from_secs(5))
            .await;
        let out = inv.output().unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_failure() {
        let inv = CommandRunner::new()
            .run(&cmd(&["/nonexistent/guardstick-probe"]), Duration::from_secs(5))
            .await;
        assert!(matches!(inv.outcome, CommandOutcome::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_command_is_execution_failure() {
        let inv = CommandRunner::new().run(&[], Duration::from_secs(1)).await;
        assert!(matches!(inv.outcome, CommandOutcome::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_returns_promptly() {
        let started = std::time::Instant::now();
        let inv = CommandRunner::new()
            .run(&cmd(&["sleep", "5"]), Duration::from_millis(200))
            .await;
        assert_eq!(inv.outcome, CommandOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
