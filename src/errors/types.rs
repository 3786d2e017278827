use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Command timed out: {0}")]
    CommandTimedOut(String),

    #[error("Command execution failed: {0}")]
    CommandExecutionFailed(String),

    #[error("Ambiguous output: {0}")]
    ParseAmbiguous(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NoValidLogs(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Report already exists: {0}")]
    ReportCollision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
