use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::records::ScanRecord;

/// Identifies the scan that produced a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Human readable scan name, e.g. "Firewall Security Check".
    pub scan_name: String,
    /// Report filename prefix, e.g. `Firewall_Security`.
    pub scan_type: String,
    /// When the scan started.
    pub scan_date: DateTime<Utc>,
    /// Name of the producing tool.
    pub tool_name: String,
    /// Wall-clock duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Hostname of the scanned machine, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Aggregates derived from `results` at finish time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Always `results.len()`.
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_status: Option<String>,
    /// Sizes of named filtered subsets of `results`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, usize>,
    /// Scalar facts that are not counts, such as an OS version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// A sub-check failure that did not abort the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub context: String,
    pub message: String,
}

/// The canonical output of every scan module.
///
/// Built only through [`ScanBuilder`], which derives the summary from the
/// final record list so the two can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub metadata: ScanMetadata,
    pub results: Vec<ScanRecord>,
    pub summary: Summary,
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    pub fn scan_type(&self) -> &str {
        &self.metadata.scan_type
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Predicate used to derive a named count from the records.
pub type RecordCounter = (&'static str, fn(&ScanRecord) -> bool);

/// Accumulates records and sub-check errors while a scan runs.
#[derive(Debug)]
pub struct ScanBuilder {
    metadata: ScanMetadata,
    started: Instant,
    results: Vec<ScanRecord>,
    errors: Vec<ScanError>,
    overall_status: Option<String>,
    notes: BTreeMap<String, String>,
}

impl ScanBuilder {
    pub fn new(scan_name: &str, scan_type: &str, tool_name: &str) -> Self {
        Self {
            metadata: ScanMetadata {
                scan_name: scan_name.to_string(),
                scan_type: scan_type.to_string(),
                scan_date: Utc::now(),
                tool_name: tool_name.to_string(),
                duration_ms: None,
                host: sysinfo::System::host_name(),
            },
            started: Instant::now(),
            results: Vec::new(),
            errors: Vec::new(),
            overall_status: None,
            notes: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, record: ScanRecord) {
        self.results.push(record);
    }

    pub fn extend<I: IntoIterator<Item = ScanRecord>>(&mut self, records: I) {
        self.results.extend(records);
    }

    /// Record a failed sub-check; the scan continues.
    pub fn record_error(&mut self, context: impl Into<String>, message: impl std::fmt::Display) {
        let context = context.into();
        let message = message.to_string();
        tracing::debug!(scan = %self.metadata.scan_type, context = %context, error = %message, "Sub-check failed");
        self.errors.push(ScanError { context, message });
    }

    pub fn set_overall_status(&mut self, status: impl Into<String>) {
        self.overall_status = Some(status.into());
    }

    pub fn note(&mut self, key: &str, value: impl Into<String>) {
        self.notes.insert(key.to_string(), value.into());
    }

    pub fn records(&self) -> &[ScanRecord] {
        &self.results
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Freeze the scan. Every counter is evaluated against the final records.
    pub fn finish(self, counters: &[RecordCounter]) -> ScanResult {
        let counts = counters
            .iter()
            .map(|(name, pred)| (name.to_string(), self.results.iter().filter(|r| pred(r)).count()))
            .collect();

        let mut metadata = self.metadata;
        metadata.duration_ms = Some(self.started.elapsed().as_millis() as u64);

        ScanResult {
            summary: Summary {
                total: self.results.len(),
                overall_status: self.overall_status,
                counts,
                notes: self.notes,
            },
            metadata,
            results: self.results,
            errors: self.errors,
        }
    }
}
