use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::ScanConfig;
use crate::models::{DuplicateSet, LargeOldFile, RecordCounter, ScanBuilder, ScanRecord};
use crate::utils::fs::sha256_file;
use super::walk::{walk_files, WalkReport};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "large_old_files",
    scan_type: "Large_Old_Files",
    display_name: "Large and Old Files Scan",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("large", |r| matches!(r, ScanRecord::LargeOldFile(f) if f.large)),
    ("old", |r| matches!(r, ScanRecord::LargeOldFile(f) if f.old)),
    ("duplicate_sets", |r| matches!(r, ScanRecord::DuplicateSet(_))),
];

pub struct LargeOldFilesScanner;

#[derive(Debug, Clone, Copy)]
pub struct FileThresholds {
    pub large_bytes: u64,
    pub old_after: Duration,
    pub max_records: usize,
}

impl FileThresholds {
    pub fn from_settings(settings: &ScanConfig) -> Self {
        Self {
            large_bytes: settings.large_file_mb.saturating_mul(1024 * 1024),
            old_after: Duration::from_secs(settings.old_file_days.saturating_mul(24 * 60 * 60)),
            max_records: settings.max_file_records,
        }
    }
}

#[derive(Debug, Default)]
pub struct FileFindings {
    pub files: Vec<LargeOldFile>,
    pub duplicates: Vec<DuplicateSet>,
    pub truncated: bool,
}

/// Walk `roots` for files at or above the size threshold or untouched for
/// longer than the age threshold, then look for duplicate content among
/// the large ones.
pub fn find_large_old(roots: &[PathBuf], limits: FileThresholds, deadline: Instant) -> (FileFindings, WalkReport) {
    let now = SystemTime::now();
    let mut findings = FileFindings::default();
    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    let mut total = WalkReport::default();

    for root in roots {
        if !root.is_dir() {
            continue;
        }
        let report = walk_files(root, deadline, &[], false, |path: &Path, meta| {
            let size = meta.len();
            let modified = meta.modified().ok();
            let large = size >= limits.large_bytes;
            let old = modified
                .and_then(|m| now.duration_since(m).ok())
                .map(|age| age >= limits.old_after)
                .unwrap_or(false);
            if large {
                by_size.entry(size).or_default().push(path.to_path_buf());
            }
            if large || old {
                if findings.files.len() < limits.max_records {
                    findings.files.push(LargeOldFile {
                        path: display_path(path),
                        size_bytes: size,
                        modified: modified.map(DateTime::<Utc>::from).unwrap_or_default(),
                        large,
                        old,
                    });
                } else {
                    findings.truncated = true;
                }
            }
            true
        });
        total.merge(report);
        if total.deadline_hit {
            break;
        }
    }

    let (duplicates, unreadable) = find_duplicates(by_size, deadline);
    total.unreadable += unreadable;
    findings.duplicates = duplicates;
    (findings, total)
}

/// Hashes only files that share a byte size with another candidate.
pub fn find_duplicates(by_size: HashMap<u64, Vec<PathBuf>>, deadline: Instant) -> (Vec<DuplicateSet>, usize) {
    let mut sets = Vec::new();
    let mut unreadable = 0usize;
    let mut sizes: Vec<_> = by_size.into_iter().filter(|(_, paths)| paths.len() >= 2).collect();
    sizes.sort_by(|a, b| b.0.cmp(&a.0));

    for (size, paths) in sizes {
        if Instant::now() >= deadline {
            break;
        }
        let mut by_hash: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in paths {
            match sha256_file(&path) {
                Ok(hash) => by_hash.entry(hash).or_default().push(display_path(&path)),
                Err(_) => unreadable += 1,
            }
        }
        sets.extend(
            by_hash
                .into_iter()
                .filter(|(_, paths)| paths.len() >= 2)
                .map(|(sha256, paths)| DuplicateSet { sha256, size_bytes: size, paths }),
        );
    }
    (sets, unreadable)
}

#[async_trait]
impl Scanner for LargeOldFilesScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, deadline: Instant) {
        let roots = ctx.settings.file_roots.clone();
        let limits = FileThresholds::from_settings(&ctx.settings);
        out.note("large_threshold_mb", ctx.settings.large_file_mb.to_string());
        out.note("old_threshold_days", ctx.settings.old_file_days.to_string());

        match tokio::task::spawn_blocking(move || find_large_old(&roots, limits, deadline)).await {
            Ok((findings, report)) => {
                report.record(out, "file walk");
                if findings.truncated {
                    out.note("truncated_at", limits.max_records.to_string());
                }
                out.extend(findings.files.into_iter().map(ScanRecord::LargeOldFile));
                out.extend(findings.duplicates.into_iter().map(ScanRecord::DuplicateSet));
            }
            Err(e) => out.record_error("file walk", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}
