use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendKind, LlmConfig};
use crate::errors::GuardError;
use super::local::LocalModelBackend;
use super::managed::ManagedBackend;

pub fn create_backend(config: &LlmConfig) -> Result<ManagedBackend, GuardError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let backend = match config.backend {
        BackendKind::Local => LocalModelBackend::new(
            BackendKind::Local.as_str(),
            config.base_url.as_deref(),
            &config.model,
            config.api_key.as_deref(),
            timeout,
        )?,
        BackendKind::OpenaiCompatible => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                GuardError::Config("llm.base_url is required for the openai_compatible backend".into())
            })?;
            LocalModelBackend::new(
                BackendKind::OpenaiCompatible.as_str(),
                Some(base_url),
                &config.model,
                config.api_key.as_deref(),
                timeout,
            )?
        }
    };
    Ok(ManagedBackend::new(Arc::new(backend)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_needs_no_url() {
        let backend = create_backend(&LlmConfig::default()).unwrap();
        assert_eq!(backend.backend_name(), "local");
        assert_eq!(backend.model_name(), "mistral:7b");
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_openai_compatible_requires_url() {
        let config = LlmConfig { backend: BackendKind::OpenaiCompatible, ..Default::default() };
        assert!(matches!(create_backend(&config), Err(GuardError::Config(_))));
    }
}
