use serde::{Deserialize, Serialize};

use crate::models::{ReportFile, Summary};
use crate::query::AskMetadata;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub script: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub status: &'static str,
    /// One-line human summary of the run.
    pub output: String,
    pub script: String,
    pub timestamp: String,
    pub report: ReportFile,
    pub summary: Summary,
    pub error_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ScriptInfo {
    pub key: &'static str,
    pub scan_type: &'static str,
    pub name: &'static str,
    /// Per-command timeout.
    pub timeout_secs: u64,
    /// Whole-scan budget.
    pub budget_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteLogsRequest {
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub response: String,
    pub metadata: AskMetadata,
}
