use std::fs::Metadata;
use std::path::Path;
use std::time::Instant;

use walkdir::{DirEntry, WalkDir};
use crate::errors::GuardError;
use crate::models::ScanBuilder;

/// What happened during a bounded walk, for the report's error list.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkReport {
    pub files_seen: usize,
    pub unreadable: usize,
    pub deadline_hit: bool,
}

impl WalkReport {
    pub fn merge(&mut self, other: WalkReport) {
        self.files_seen += other.files_seen;
        self.unreadable += other.unreadable;
        self.deadline_hit |= other.deadline_hit;
    }

    pub fn record(&self, out: &mut ScanBuilder, context: &str) {
        if self.unreadable > 0 {
            out.record_error(
                context,
                format!("{} entries could not be read (permissions or races)", self.unreadable),
            );
        }
        if self.deadline_hit {
            out.record_error(
                context,
                GuardError::CommandTimedOut(format!(
                    "walk stopped at the time budget after {} files",
                    self.files_seen
                )),
            );
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Walk regular files under `root` without following symlinks, stopping at
/// `deadline`. `visit` returns `false` to stop early.
pub fn walk_files<F>(root: &Path, deadline: Instant, skip: &[&Path], skip_hidden: bool, mut visit: F) -> WalkReport
where
    F: FnMut(&Path, &Metadata) -> bool,
{
    let mut report = WalkReport::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(skip_hidden && is_hidden(e)) && !skip.iter().any(|s| e.path() == *s));

    for entry in walker {
        if Instant::now() >= deadline {
            report.deadline_hit = true;
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                report.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(_) => {
                report.unreadable += 1;
                continue;
            }
        };
        report.files_seen += 1;
        if !visit(entry.path(), &meta) {
            break;
        }
    }
    report
}
