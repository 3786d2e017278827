use async_trait::async_trait;
use crate::errors::GuardError;
use super::types::{Completion, GenerationParams};

/// A text-completion backend. The query service treats it as a black box
/// from prompt to text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// One-time setup such as checking that the model is available.
    /// Called at most once per successful lifecycle by [`super::ManagedBackend`].
    async fn initialize(&self) -> Result<(), GuardError>;

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Completion, GuardError>;

    /// Backend name for logging and response metadata
    fn backend_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Whether overlapping `generate` calls are safe.
    fn supports_concurrent_generation(&self) -> bool {
        false
    }
}
