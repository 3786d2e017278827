use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;

use crate::models::{IndicatorKind, RansomwareIndicator, RecordCounter, ScanBuilder, ScanRecord};
use crate::utils::fs::shannon_entropy_file;
use super::parse::lines;
use super::startup::list_dir;
use super::walk::{walk_files, WalkReport};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "ransomware",
    scan_type: "Ransomware_Monitor",
    display_name: "Ransomware Monitor",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("high_entropy_file", |r| matches!(r, ScanRecord::RansomwareIndicator(i) if i.indicator == IndicatorKind::HighEntropyFile)),
    ("ransom_note", |r| matches!(r, ScanRecord::RansomwareIndicator(i) if i.indicator == IndicatorKind::RansomNote)),
    ("suspicious_process", |r| matches!(r, ScanRecord::RansomwareIndicator(i) if i.indicator == IndicatorKind::SuspiciousProcess)),
    ("persistence_item", |r| matches!(r, ScanRecord::RansomwareIndicator(i) if i.indicator == IndicatorKind::PersistenceItem)),
];

pub const RANSOM_NOTES: &[&str] = &["README_DECRYPT.txt", "DECRYPT_INSTRUCTIONS.html", "DECRYPT_FILES.html"];
const PROCESS_KEYWORDS: &[&str] = &["encrypt", "ransom"];
const RECENT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Formats that are high-entropy by construction.
const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "tgz", "bz2", "xz", "7z", "rar", "dmg", "pkg", "jpg", "jpeg", "png", "gif", "heic", "webp",
    "mp3", "m4a", "aac", "mp4", "mov", "m4v", "pdf", "docx", "xlsx", "pptx",
];

pub struct RansomwareScanner;

#[async_trait]
impl Scanner for RansomwareScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, deadline: Instant) {
        let home = ctx.home_dir.clone();
        let threshold = ctx.settings.entropy_threshold;
        let max_records = ctx.settings.max_file_records;
        let walked = tokio::task::spawn_blocking(move || scan_home(&home, threshold, max_records, deadline)).await;
        match walked {
            Ok((indicators, report)) => {
                report.record(out, "home directory walk");
                out.extend(indicators.into_iter().map(ScanRecord::RansomwareIndicator));
            }
            Err(e) => out.record_error("home directory walk", e),
        }

        match ctx.output(&["ps", "aux"]).await {
            Ok(output) => out.extend(
                suspicious_processes(&output.stdout)
                    .into_iter()
                    .map(ScanRecord::RansomwareIndicator),
            ),
            Err(e) => out.record_error("ps aux", e),
        }

        let persistence_dirs = [
            PathBuf::from("/Library/LaunchAgents"),
            PathBuf::from("/Library/LaunchDaemons"),
            ctx.home("Library/LaunchAgents"),
        ];
        for dir in &persistence_dirs {
            match list_dir(dir).await {
                Ok(names) => out.extend(names.into_iter().map(|name| {
                    ScanRecord::RansomwareIndicator(RansomwareIndicator {
                        indicator: IndicatorKind::PersistenceItem,
                        subject: display_path(&dir.join(name)),
                        entropy: None,
                    })
                })),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => out.record_error(display_path(dir), e),
            }
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| COMPRESSED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_ransom_note(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| RANSOM_NOTES.iter().any(|note| note.eq_ignore_ascii_case(n)))
        .unwrap_or(false)
}

/// Walk `home` (skipping `~/Library` and hidden entries) for ransom notes
/// and recently modified files whose content looks encrypted.
pub fn scan_home(home: &Path, threshold: f64, max_records: usize, deadline: Instant) -> (Vec<RansomwareIndicator>, WalkReport) {
    let library = home.join("Library");
    let now = SystemTime::now();
    let mut indicators = Vec::new();
    let mut unreadable = 0usize;
    let mut report = walk_files(home, deadline, &[library.as_path()], true, |path, meta| {
        if is_ransom_note(path) {
            indicators.push(RansomwareIndicator {
                indicator: IndicatorKind::RansomNote,
                subject: display_path(path),
                entropy: None,
            });
        }
        let recent = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .map(|age| age <= RECENT_WINDOW)
            .unwrap_or(false);
        if recent && meta.len() > 0 && !is_compressed(path) {
            match shannon_entropy_file(path) {
                Ok(entropy) if entropy > threshold => indicators.push(RansomwareIndicator {
                    indicator: IndicatorKind::HighEntropyFile,
                    subject: display_path(path),
                    entropy: Some(entropy),
                }),
                Ok(_) => {}
                Err(_) => unreadable += 1,
            }
        }
        indicators.len() < max_records
    });
    report.unreadable += unreadable;
    (indicators, report)
}

/// `ps aux` lines mentioning encryption or ransom.
pub fn suspicious_processes(text: &str) -> Vec<RansomwareIndicator> {
    lines(text)
        .skip(1)
        .filter(|line| {
            let lower = line.to_lowercase();
            PROCESS_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|line| RansomwareIndicator {
            indicator: IndicatorKind::SuspiciousProcess,
            subject: line.to_string(),
            entropy: None,
        })
        .collect()
}
