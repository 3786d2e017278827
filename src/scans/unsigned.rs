use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{AppSignature, RecordCounter, ScanBuilder, ScanRecord, SignatureStatus};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "unsigned_apps",
    scan_type: "Unsigned_Apps",
    display_name: "Unsigned Applications",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("signed", |r| matches!(r, ScanRecord::AppSignature(a) if a.status == SignatureStatus::Signed)),
    ("unsigned", |r| matches!(r, ScanRecord::AppSignature(a) if a.status == SignatureStatus::Unsigned)),
    ("unknown", |r| matches!(r, ScanRecord::AppSignature(a) if a.status == SignatureStatus::Unknown)),
];

pub struct UnsignedAppsScanner;

/// `.app` bundles directly inside `dir`, sorted by name.
pub(crate) async fn list_app_bundles(dir: &std::path::Path) -> std::io::Result<Vec<PathBuf>> {
    let mut apps = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "app").unwrap_or(false) {
            apps.push(path);
        }
    }
    apps.sort();
    Ok(apps)
}

#[async_trait]
impl Scanner for UnsignedAppsScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        for dir in [PathBuf::from("/Applications"), ctx.home("Applications")] {
            let apps = match list_app_bundles(&dir).await {
                Ok(apps) => apps,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    out.record_error(display_path(&dir), e);
                    continue;
                }
            };
            for app in apps {
                let path = display_path(&app);
                let invocation = ctx
                    .run(&["spctl", "--assess", "--type", "exec", &path], TimeoutClass::Quick)
                    .await;
                let (status, detail) = match invocation.into_output() {
                    Ok(output) => classify_assessment(output.exit_code, &output.stderr),
                    Err(e) => {
                        let message = e.to_string();
                        out.record_error(format!("spctl {}", path), &message);
                        (SignatureStatus::Unknown, message)
                    }
                };
                out.push(ScanRecord::AppSignature(AppSignature {
                    application: app
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path,
                    status,
                    detail,
                }));
            }
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// spctl exits 0 for an accepted bundle and prints "rejected" otherwise.
pub fn classify_assessment(exit_code: i32, stderr: &str) -> (SignatureStatus, String) {
    let detail = stderr.trim().to_string();
    if exit_code == 0 {
        (SignatureStatus::Signed, detail)
    } else if detail.contains("rejected") {
        (SignatureStatus::Unsigned, detail)
    } else {
        (SignatureStatus::Unknown, detail)
    }
}
