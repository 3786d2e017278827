#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use guardstick::config::GuardConfig;
use guardstick::context::AppContext;
use guardstick::errors::GuardError;
use guardstick::llm::{Completion, CompletionBackend, GenerationParams};
use guardstick::runner::{CommandExecutor, CommandInvocation, CommandOutcome, CommandOutput};

/// Replies from a fixed table keyed by the space-joined command line.
#[derive(Default)]
pub struct FakeExecutor {
    replies: HashMap<String, String>,
}

impl FakeExecutor {
    pub fn with(mut self, command: &str, stdout: &str) -> Self {
        self.replies.insert(command.to_string(), stdout.to_string());
        self
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, command: &[String], timeout: Duration) -> CommandInvocation {
        let key = command.join(" ");
        let outcome = match self.replies.get(&key) {
            Some(stdout) => CommandOutcome::Completed(CommandOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
                exit_code: 0,
            }),
            None => CommandOutcome::ExecutionFailed { message: format!("no such command: {}", key) },
        };
        CommandInvocation { command: command.to_vec(), timeout, outcome }
    }
}

/// Echoes a canned answer and remembers every prompt it was given.
pub struct FakeBackend {
    pub answer: String,
    pub fail_with: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    pub init_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail_with: None,
            prompts: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.to_string()), ..Self::answering("") }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn initialize(&self) -> Result<(), GuardError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<Completion, GuardError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(message) = &self.fail_with {
            return Err(GuardError::GenerationFailed(message.clone()));
        }
        Ok(Completion {
            text: self.answer.clone(),
            input_tokens: Some(42),
            output_tokens: Some(7),
            model: "fake-model".to_string(),
        })
    }

    fn backend_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// Config rooted in a temporary directory with network lookups off.
pub fn test_config(root: &Path) -> GuardConfig {
    let mut config = GuardConfig::default();
    config.paths.data_dir = root.join("data");
    config.paths.reports_dir = root.join("data").join("log_reports");
    config.paths.static_dir = root.join("static");
    config.paths.templates_dir = root.join("static").join("templates");
    config.paths.exploit_db = root.join("missing.csv");
    config.scans.geolocation = false;
    config.scans.quick_timeout_secs = 5;
    config.scans.long_timeout_secs = 5;
    config
}

pub fn test_context(root: &Path, executor: FakeExecutor, backend: Arc<FakeBackend>) -> AppContext {
    AppContext::with_parts(test_config(root), Arc::new(executor), backend).unwrap()
}

pub fn write_report(root: &Path, name: &str, body: &str) {
    let dir = root.join("data").join("log_reports");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), body).unwrap();
}
