use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/answer exchange kept in the rolling history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub response: String,
    pub logs_analyzed: Vec<String>,
}
