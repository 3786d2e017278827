use std::path::PathBuf;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PREAMBLE: &str = "You are a helpful AI assistant specializing in system log analysis. \
Answer the user's question using only the log content provided below. \
Respond in plain English sentences, not JSON or code. \
If the logs do not contain the answer, say so.";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub llm: LlmConfig,
    pub scans: ScanConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5002,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub exploit_db: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            reports_dir: data_dir.join("log_reports"),
            exploit_db: data_dir.join("Exploit_DB").join("files_exploits.csv"),
            data_dir,
            static_dir: PathBuf::from("./static"),
            templates_dir: PathBuf::from("./static/templates"),
        }
    }
}

impl PathsConfig {
    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("llm_scan_results.json")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Local,
    OpenaiCompatible,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenaiCompatible => "openai_compatible",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Character budget for question plus log text.
    pub max_prompt_chars: usize,
    pub request_timeout_secs: u64,
    pub preamble: String,
    pub plain_text_only: bool,
    pub history_limit: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            base_url: None,
            model: "mistral:7b".to_string(),
            api_key: None,
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            max_prompt_chars: 12_000,
            request_timeout_secs: 600,
            preamble: DEFAULT_PREAMBLE.to_string(),
            plain_text_only: true,
            history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Per-command timeouts.
    pub quick_timeout_secs: u64,
    pub long_timeout_secs: u64,
    /// Whole-module budgets; each must cover several command timeouts.
    pub quick_budget_secs: u64,
    pub long_budget_secs: u64,
    pub geolocation: bool,
    pub geolocation_url: String,
    pub large_file_mb: u64,
    pub old_file_days: u64,
    pub recent_snapshot_days: i64,
    pub entropy_threshold: f64,
    /// Upper bound on per-file records in filesystem-wide scans.
    pub max_file_records: usize,
    /// Roots walked by the large/old file scan.
    pub file_roots: Vec<PathBuf>,
    /// Directories whose executables are hashed.
    pub hash_dirs: Vec<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            quick_timeout_secs: 30,
            long_timeout_secs: 1800,
            quick_budget_secs: 300,
            long_budget_secs: 7200,
            geolocation: true,
            geolocation_url: "https://ipinfo.io".to_string(),
            large_file_mb: 500,
            old_file_days: 180,
            recent_snapshot_days: 7,
            entropy_threshold: 7.5,
            max_file_records: 10_000,
            file_roots: vec![
                PathBuf::from("/Users"),
                PathBuf::from("/Applications"),
                PathBuf::from("/Library"),
            ],
            hash_dirs: vec![
                PathBuf::from("/usr/bin"),
                PathBuf::from("/usr/sbin"),
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/Applications"),
            ],
        }
    }
}
