use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::errors::GuardError;
use crate::llm::{GenerationParams, ManagedBackend};
use crate::models::QaHistoryEntry;
use crate::reporting::ReportCatalog;
use crate::utils::truncation::char_len;
use super::history::QaHistory;
use super::prompt::{build_prompt, join_logs};

/// Substituted when the model answers with JSON or a list despite the
/// plain-English instruction.
pub const PLAIN_TEXT_FALLBACK: &str = "The logs were analyzed successfully. Key insights include system \
activities, potential risks, and normal operations, all summarized in simple terms.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskMetadata {
    pub model: String,
    pub backend: String,
    pub input_chars: usize,
    pub output_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub truncated: bool,
    pub logs_analyzed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskOutcome {
    pub answer: String,
    pub metadata: AskMetadata,
}

/// Answers free-text questions about stored reports.
pub struct QueryService {
    catalog: ReportCatalog,
    backend: Arc<ManagedBackend>,
    history: QaHistory,
    config: LlmConfig,
}

pub fn looks_structured(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

impl QueryService {
    pub fn new(catalog: ReportCatalog, backend: Arc<ManagedBackend>, history: QaHistory, config: LlmConfig) -> Self {
        Self { catalog, backend, history, config }
    }

    pub fn history(&self) -> &QaHistory {
        &self.history
    }

    pub fn backend(&self) -> &ManagedBackend {
        &self.backend
    }

    pub async fn ask(&self, question: &str, selected: &[String]) -> Result<AskOutcome, GuardError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GuardError::InvalidRequest("Question is required".into()));
        }
        if selected.is_empty() {
            return Err(GuardError::InvalidRequest("At least one log file must be selected".into()));
        }

        let mut loaded: Vec<(String, String)> = Vec::new();
        for name in selected {
            match self.catalog.read_raw(name).await {
                Ok(bytes) => loaded.push((name.clone(), String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => warn!(report = %name, error = %e, "Skipping unreadable report"),
            }
        }
        if loaded.is_empty() {
            return Err(GuardError::NoValidLogs("No valid logs found".into()));
        }
        let logs_analyzed: Vec<String> = loaded.iter().map(|(name, _)| name.clone()).collect();

        let logs = join_logs(loaded.iter().map(|(n, c)| (n.as_str(), c.as_str())));
        let prompt = build_prompt(&self.config.preamble, question, &logs, self.config.max_prompt_chars);
        if prompt.truncated {
            info!(budget = self.config.max_prompt_chars, log_chars = char_len(&logs), "Prompt truncated to budget");
        }

        let params = GenerationParams::from_config(&self.config);
        let completion = self.backend.generate(&prompt.text, &params).await.map_err(|e| match e {
            GuardError::GenerationFailed(message) => GuardError::GenerationFailed(message),
            other => GuardError::GenerationFailed(other.to_string()),
        })?;

        let mut answer = completion.text.trim().to_string();
        if self.config.plain_text_only && looks_structured(&answer) {
            warn!("Structured output in answer; replacing with plain-English notice");
            answer = PLAIN_TEXT_FALLBACK.to_string();
        }

        let entry = QaHistoryEntry {
            timestamp: Utc::now(),
            question: question.to_string(),
            response: answer.clone(),
            logs_analyzed: logs_analyzed.clone(),
        };
        // History persistence failures never fail the request.
        if let Err(e) = self.history.append(entry).await {
            warn!(error = %e, "Failed to persist Q&A history");
        }

        Ok(AskOutcome {
            metadata: AskMetadata {
                model: completion.model,
                backend: self.backend.backend_name().to_string(),
                input_chars: char_len(&prompt.text),
                output_chars: char_len(&answer),
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
                max_tokens: params.max_tokens,
                truncated: prompt.truncated,
                logs_analyzed,
            },
            answer,
        })
    }
}
