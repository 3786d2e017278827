//! External command execution with a hard timeout.
//!
//! The runner never interprets exit codes: utilities like `lsof` or `grep`
//! use them inconsistently, so callers get the raw code and decide.

pub mod system;

use std::time::Duration;
use async_trait::async_trait;
use crate::errors::GuardError;

pub use system::CommandRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed(CommandOutput),
    TimedOut,
    ExecutionFailed { message: String },
}

/// One finished invocation. Owned by the caller that asked for it.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub command: Vec<String>,
    pub timeout: Duration,
    pub outcome: CommandOutcome,
}

impl CommandInvocation {
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }

    pub fn output(&self) -> Option<&CommandOutput> {
        match &self.outcome {
            CommandOutcome::Completed(out) => Some(out),
            _ => None,
        }
    }

    /// Collapse into a result for sub-checks that treat a timeout and a
    /// spawn failure alike.
    pub fn into_output(self) -> Result<CommandOutput, GuardError> {
        let display = self.display_command();
        match self.outcome {
            CommandOutcome::Completed(out) => Ok(out),
            CommandOutcome::TimedOut => Err(GuardError::CommandTimedOut(format!(
                "`{}` exceeded {}s",
                display,
                self.timeout.as_secs_f64()
            ))),
            CommandOutcome::ExecutionFailed { message } => Err(GuardError::CommandExecutionFailed(
                format!("`{}`: {}", display, message),
            )),
        }
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &[String], timeout: Duration) -> CommandInvocation;

    /// Convenience for string-literal argument lists.
    async fn run_args(&self, args: &[&str], timeout: Duration) -> CommandInvocation {
        let command: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.run(&command, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(outcome: CommandOutcome) -> CommandInvocation {
        CommandInvocation {
            command: vec!["csrutil".into(), "status".into()],
            timeout: Duration::from_secs(30),
            outcome,
        }
    }

    #[test]
    fn test_nonzero_exit_is_still_output() {
        let inv = invocation(CommandOutcome::Completed(CommandOutput {
            stdout: String::new(),
            stderr: "no match".into(),
            exit_code: 1,
        }));
        let out = inv.into_output().unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(!out.success());
    }

    #[test]
    fn test_timeout_maps_to_error() {
        let err = invocation(CommandOutcome::TimedOut).into_output().unwrap_err();
        assert!(matches!(err, GuardError::CommandTimedOut(_)));
        assert!(err.to_string().contains("csrutil status"));
    }

    #[test]
    fn test_execution_failure_maps_to_error() {
        let err = invocation(CommandOutcome::ExecutionFailed { message: "not found".into() })
            .into_output()
            .unwrap_err();
        assert!(matches!(err, GuardError::CommandExecutionFailed(_)));
    }
}
