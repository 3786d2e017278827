use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use crate::errors::GuardError;
use super::provider::CompletionBackend;
use super::types::{Completion, GenerationParams};

/// Owns the lifecycle of a [`CompletionBackend`]: constructed unconfigured,
/// initialized once on first use, and kept from overlapping generations
/// unless the backend says that is safe.
pub struct ManagedBackend {
    inner: Arc<dyn CompletionBackend>,
    ready: OnceCell<()>,
    gate: Mutex<()>,
}

impl ManagedBackend {
    pub fn new(inner: Arc<dyn CompletionBackend>) -> Self {
        Self {
            inner,
            ready: OnceCell::new(),
            gate: Mutex::new(()),
        }
    }

    /// Concurrent first callers wait on the same initialization. A failed
    /// attempt leaves the cell empty so a later call can retry.
    pub async fn ensure_initialized(&self) -> Result<(), GuardError> {
        self.ready
            .get_or_try_init(|| async {
                info!(backend = self.inner.backend_name(), model = self.inner.model_name(), "Initializing completion backend");
                self.inner.initialize().await
            })
            .await
            .map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    pub async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Completion, GuardError> {
        self.ensure_initialized().await?;
        if self.inner.supports_concurrent_generation() {
            return self.inner.generate(prompt, params).await;
        }
        let _turn = self.gate.lock().await;
        self.inner.generate(prompt, params).await
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;

    #[derive(Default)]
    struct CountingBackend {
        init_calls: AtomicUsize,
        fail_first_init: bool,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for CountingBackend {
        async fn initialize(&self) -> Result<(), GuardError> {
            let n = self.init_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first_init && n == 0 {
                return Err(GuardError::GenerationFailed("model file missing".into()));
            }
            Ok(())
        }

        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<Completion, GuardError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion { text: prompt.to_uppercase(), input_tokens: None, output_tokens: None, model: "fake".into() })
        }

        fn backend_name(&self) -> &str {
            "fake"
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_initialized_once_under_concurrency() {
        let inner = Arc::new(CountingBackend::default());
        let managed = Arc::new(ManagedBackend::new(inner.clone()));
        let calls = (0..8).map(|i| {
            let managed = Arc::clone(&managed);
            tokio::spawn(async move { managed.generate(&format!("q{}", i), &GenerationParams::default()).await })
        });
        for handle in futures::future::join_all(calls).await {
            handle.unwrap().unwrap();
        }
        assert_eq!(inner.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(inner.max_active.load(Ordering::SeqCst), 1);
        assert!(managed.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let inner = Arc::new(CountingBackend { fail_first_init: true, ..Default::default() });
        let managed = ManagedBackend::new(inner.clone());
        assert!(managed.generate("a", &GenerationParams::default()).await.is_err());
        assert!(!managed.is_initialized());
        let completion = managed.generate("a", &GenerationParams::default()).await.unwrap();
        assert_eq!(completion.text, "A");
        assert_eq!(inner.init_calls.load(Ordering::SeqCst), 2);
    }
}
