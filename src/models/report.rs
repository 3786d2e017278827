use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// A report that has just been persisted by the writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A catalog listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    /// Human readable size, e.g. "1.5 KB".
    pub size: String,
    pub size_bytes: u64,
    /// RFC 3339 modification time.
    pub timestamp: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub not_found: Vec<String>,
}
