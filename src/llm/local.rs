use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::GuardError;
use super::provider::CompletionBackend;
use super::types::{Completion, GenerationParams};

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434/v1";

/// A model served over the OpenAI-compatible chat API, e.g. Ollama,
/// llama.cpp server or LM Studio.
pub struct LocalModelBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    name: &'static str,
}

impl LocalModelBackend {
    pub fn new(
        name: &'static str,
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GuardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuardError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_LOCAL_URL).trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(str::to_string),
            name,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, GuardError> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GuardError::Network(format!("{} request failed: {}", self.name, e)))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| GuardError::GenerationFailed(format!("Failed to parse {} response: {}", self.name, e)))?;

        if let Some(error) = data.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| error.as_str())
                .unwrap_or("Unknown");
            return Err(GuardError::GenerationFailed(message.to_string()));
        }
        if !status.is_success() {
            return Err(GuardError::GenerationFailed(format!("{} returned HTTP {}", self.name, status)));
        }
        Ok(data)
    }
}

#[async_trait]
impl CompletionBackend for LocalModelBackend {
    async fn initialize(&self) -> Result<(), GuardError> {
        let data = self.send(self.client.get(format!("{}/models", self.base_url))).await?;
        let available: Vec<&str> = data["data"]
            .as_array()
            .map(|models| models.iter().filter_map(|m| m["id"].as_str()).collect())
            .unwrap_or_default();
        debug!(backend = self.name, models = ?available, "Model listing");
        if !available.iter().any(|id| *id == self.model) {
            return Err(GuardError::GenerationFailed(format!(
                "Model {} is not available at {}",
                self.model, self.base_url
            )));
        }
        info!(backend = self.name, model = %self.model, "Completion backend ready");
        Ok(())
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Completion, GuardError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "stream": false,
        });

        let data = self
            .send(self.client.post(format!("{}/chat/completions", self.base_url)).json(&body))
            .await?;

        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| GuardError::GenerationFailed(format!("No content in {} response", self.name)))?
            .to_string();

        Ok(Completion {
            text,
            input_tokens: data["usage"]["prompt_tokens"].as_u64(),
            output_tokens: data["usage"]["completion_tokens"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn backend_name(&self) -> &str {
        self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_concurrent_generation(&self) -> bool {
        // Hosted OpenAI-compatible services queue requests themselves.
        self.name != "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn mock_server() -> Router {
        Router::new()
            .route("/v1/models", get(|| async { Json(json!({"data": [{"id": "mistral:7b"}]})) }))
            .route(
                "/v1/chat/completions",
                post(|Json(body): Json<Value>| async move {
                    let prompt = body["messages"][0]["content"].as_str().unwrap_or("").to_string();
                    Json(json!({
                        "choices": [{"message": {"content": format!("echo: {}", prompt)}}],
                        "usage": {"prompt_tokens": 12, "completion_tokens": 3},
                        "max_tokens_seen": body["max_tokens"],
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_initialize_checks_model_listing() {
        let url = serve(mock_server()).await;
        let ok = LocalModelBackend::new("local", Some(&url), "mistral:7b", None, Duration::from_secs(5)).unwrap();
        ok.initialize().await.unwrap();

        let missing = LocalModelBackend::new("local", Some(&url), "llama3:70b", None, Duration::from_secs(5)).unwrap();
        let err = missing.initialize().await.unwrap_err();
        assert!(matches!(err, GuardError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_generate_returns_text_and_usage() {
        let url = serve(mock_server()).await;
        let backend = LocalModelBackend::new("local", Some(&url), "mistral:7b", None, Duration::from_secs(5)).unwrap();
        let completion = backend.generate("hello", &GenerationParams::default()).await.unwrap();
        assert_eq!(completion.text, "echo: hello");
        assert_eq!(completion.input_tokens, Some(12));
        assert_eq!(completion.output_tokens, Some(3));
    }

    #[tokio::test]
    async fn test_error_body_surfaces_message() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": {"message": "model crashed"}})),
                )
            }),
        );
        let url = serve(app).await;
        let backend = LocalModelBackend::new("local", Some(&url), "mistral:7b", None, Duration::from_secs(5)).unwrap();
        let err = backend.generate("hello", &GenerationParams::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Generation failed: model crashed");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let backend = LocalModelBackend::new(
            "local",
            Some("http://127.0.0.1:1/v1"),
            "mistral:7b",
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(backend.initialize().await, Err(GuardError::Network(_))));
    }
}
