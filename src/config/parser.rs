use std::path::{Path, PathBuf};
use crate::errors::GuardError;
use super::credentials::resolve_env_reference;
use super::types::GuardConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

const MAX_CONFIG_BYTES: u64 = 1_048_576;
/// 1 PiB expressed in MiB.
const MAX_LARGE_FILE_MB: u64 = 1 << 30;
/// A thousand years.
const MAX_OLD_FILE_DAYS: u64 = 365_000;

/// Load configuration: the YAML file when given, defaults otherwise, then
/// environment overrides, then semantic validation.
pub async fn load_config(path: Option<&Path>) -> Result<GuardConfig, GuardError> {
    let mut config = match path {
        Some(path) => parse_config(path).await?,
        None => GuardConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_semantics(&config)?;
    Ok(config)
}

pub async fn parse_config(path: &Path) -> Result<GuardConfig, GuardError> {
    if !path.exists() {
        return Err(GuardError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(GuardError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<GuardConfig, GuardError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    // An empty file parses as null
    if yaml.is_null() {
        return Ok(GuardConfig::default());
    }

    validate_schema(&yaml)?;

    let mut config: GuardConfig = serde_yaml::from_value(yaml)?;
    if let Some(key) = config.llm.api_key.take() {
        config.llm.api_key = Some(resolve_env_reference(&key));
    }

    validate_semantics(&config)?;
    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), GuardError> {
    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| GuardError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| GuardError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        // Advisory only; typed parsing and semantic checks decide
        for e in errors {
            warn!(validation_error = %e, path = %e.instance_path, "Config schema warning");
        }
    }

    Ok(())
}

/// Apply `GUARDSTICK_*` environment overrides. The lookup is injected so tests
/// don't have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("GUARDSTICK_REPORTS_DIR") {
        debug!(dir = %dir, "Reports directory overridden from environment");
        config.paths.reports_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("GUARDSTICK_DATA_DIR") {
        config.paths.data_dir = PathBuf::from(dir);
    }
    if let Some(url) = lookup("GUARDSTICK_LLM_BASE_URL") {
        config.llm.base_url = Some(url);
    }
    if let Some(model) = lookup("GUARDSTICK_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(key) = lookup("GUARDSTICK_LLM_API_KEY") {
        config.llm.api_key = Some(key);
    }
}

/// Reject values that would make a component misbehave at runtime.
pub fn validate_semantics(config: &GuardConfig) -> Result<(), GuardError> {
    if config.server.port == 0 {
        return Err(GuardError::Config("server.port must be non-zero".into()));
    }
    let scans = &config.scans;
    if scans.quick_timeout_secs == 0 || scans.long_timeout_secs == 0 {
        return Err(GuardError::Config("scan timeouts must be non-zero".into()));
    }
    if scans.quick_budget_secs < scans.quick_timeout_secs || scans.long_budget_secs < scans.long_timeout_secs {
        return Err(GuardError::Config(
            "scan budgets must be at least as long as the matching command timeout".into(),
        ));
    }
    if scans.large_file_mb > MAX_LARGE_FILE_MB {
        return Err(GuardError::Config(format!(
            "scans.large_file_mb must be at most {}, got {}",
            MAX_LARGE_FILE_MB, scans.large_file_mb
        )));
    }
    if scans.old_file_days > MAX_OLD_FILE_DAYS {
        return Err(GuardError::Config(format!(
            "scans.old_file_days must be at most {}, got {}",
            MAX_OLD_FILE_DAYS, scans.old_file_days
        )));
    }
    let llm = &config.llm;
    if !(llm.top_p > 0.0 && llm.top_p <= 1.0) {
        return Err(GuardError::Config(format!("llm.top_p must be in (0, 1], got {}", llm.top_p)));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(GuardError::Config(format!(
            "llm.temperature must be in [0, 2], got {}",
            llm.temperature
        )));
    }
    if llm.max_prompt_chars < 256 {
        return Err(GuardError::Config("llm.max_prompt_chars must be at least 256".into()));
    }
    if llm.max_tokens == 0 {
        return Err(GuardError::Config("llm.max_tokens must be non-zero".into()));
    }
    if llm.history_limit == 0 {
        return Err(GuardError::Config("llm.history_limit must be at least 1".into()));
    }
    if llm.model.trim().is_empty() {
        return Err(GuardError::Config("llm.model must not be empty".into()));
    }
    if scans.long_timeout_secs < scans.quick_timeout_secs {
        warn!("scans.long_timeout_secs is shorter than scans.quick_timeout_secs");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
server:
  port: 8088
paths:
  reports_dir: /tmp/reports
llm:
  model: llama3
  max_prompt_chars: 4000
scans:
  quick_timeout_secs: 10
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.paths.reports_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.scans.quick_timeout_secs, 10);
        assert_eq!(config.scans.long_timeout_secs, 1800);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.server.port, 5002);
    }

    #[test]
    fn test_rejects_bad_top_p() {
        let err = parse_config_str("llm:\n  top_p: 1.5\n").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = parse_config_str("scans:\n  quick_timeout_secs: 0\n").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    fn test_rejects_budget_shorter_than_command_timeout() {
        let err = parse_config_str("scans:\n  quick_timeout_secs: 60\n  quick_budget_secs: 30\n").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    fn test_rejects_oversized_file_thresholds() {
        let err = parse_config_str("scans:\n  large_file_mb: 18446744073709551615\n").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
        let err = parse_config_str("scans:\n  old_file_days: 999999999999\n").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    fn test_rejects_wrong_type() {
        let err = parse_config_str("server:\n  port: not-a-port\n").unwrap_err();
        assert!(matches!(err, GuardError::Yaml(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GuardConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            "GUARDSTICK_REPORTS_DIR" => Some("/var/guard/reports".to_string()),
            "GUARDSTICK_LLM_MODEL" => Some("phi3".to_string()),
            _ => None,
        });
        assert_eq!(config.paths.reports_dir, PathBuf::from("/var/guard/reports"));
        assert_eq!(config.llm.model, "phi3");
        assert!(config.llm.base_url.is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = parse_config(Path::new("/nonexistent/guardstick.yaml")).await.unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[tokio::test]
    async fn test_parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardstick.yaml");
        tokio::fs::write(&path, "server:\n  host: 0.0.0.0\n").await.unwrap();
        let config = parse_config(&path).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
