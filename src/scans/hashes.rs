use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{ExecutableHash, RecordCounter, ScanBuilder, ScanRecord};
use crate::utils::fs::sha256_file;
use super::walk::{walk_files, WalkReport};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "executable_hashes",
    scan_type: "Executable_Hashes",
    display_name: "Executable Hashes",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[("hashed", |r| matches!(r, ScanRecord::ExecutableHash(_)))];

pub struct ExecutableHashesScanner;

#[cfg(unix)]
fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &Metadata) -> bool {
    false
}

/// Hash every executable regular file under `dirs`.
pub fn hash_executables(dirs: &[PathBuf], max_records: usize, deadline: Instant) -> (Vec<ExecutableHash>, WalkReport) {
    let mut hashes = Vec::new();
    let mut total = WalkReport::default();
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        let mut unreadable = 0usize;
        let mut report = walk_files(dir, deadline, &[], false, |path: &Path, meta: &Metadata| {
            if !is_executable(meta) {
                return true;
            }
            match sha256_file(path) {
                Ok(sha256) => hashes.push(ExecutableHash {
                    path: display_path(path),
                    sha256,
                    size_bytes: meta.len(),
                }),
                Err(_) => unreadable += 1,
            }
            hashes.len() < max_records
        });
        report.unreadable += unreadable;
        total.merge(report);
        if total.deadline_hit || hashes.len() >= max_records {
            break;
        }
    }
    (hashes, total)
}

#[async_trait]
impl Scanner for ExecutableHashesScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, deadline: Instant) {
        let dirs = ctx.settings.hash_dirs.clone();
        let max_records = ctx.settings.max_file_records;
        match tokio::task::spawn_blocking(move || hash_executables(&dirs, max_records, deadline)).await {
            Ok((hashes, report)) => {
                report.record(out, "executable walk");
                if hashes.len() >= max_records {
                    out.note("truncated_at", max_records.to_string());
                }
                out.extend(hashes.into_iter().map(ScanRecord::ExecutableHash));
            }
            Err(e) => out.record_error("executable walk", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}
