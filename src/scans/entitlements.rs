use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{AppEntitlements, RecordCounter, RiskLevel, RiskyEntitlement, ScanBuilder, ScanRecord, SignatureStatus};
use super::unsigned::list_app_bundles;
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "application_security",
    scan_type: "Application_Security",
    display_name: "Application Security",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("failed_verification", |r| matches!(r, ScanRecord::AppEntitlements(a) if a.signature == SignatureStatus::Unsigned)),
    ("risky_apps", |r| matches!(r, ScanRecord::AppEntitlements(a) if !a.entitlements.is_empty())),
    ("critical_apps", |r| {
        matches!(r, ScanRecord::AppEntitlements(a) if a.entitlements.iter().any(|e| e.risk_level == RiskLevel::Critical))
    }),
];

/// Entitlements that grant sensor access or weaken the hardened runtime.
pub const RISKY_ENTITLEMENTS: &[(&str, &str, RiskLevel)] = &[
    ("com.apple.security.device.camera", "Camera Access", RiskLevel::High),
    ("com.apple.security.device.microphone", "Microphone Access", RiskLevel::High),
    ("com.apple.security.device.audio-input", "Audio Input", RiskLevel::High),
    ("com.apple.security.cs.allow-unsigned-executable-memory", "Unsigned Memory Execution", RiskLevel::Critical),
    ("com.apple.security.cs.disable-library-validation", "Library Validation Disabled", RiskLevel::High),
    ("com.apple.security.cs.allow-dyld-environment-variables", "DYLD Environment Variables", RiskLevel::Medium),
];

pub struct ApplicationSecurityScanner;

#[async_trait]
impl Scanner for ApplicationSecurityScanner {
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
                let record = inspect_app(ctx, &app, out).await;
                out.push(ScanRecord::AppEntitlements(record));
            }
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

async fn inspect_app(ctx: &ScanContext, app: &Path, out: &mut ScanBuilder) -> AppEntitlements {
    let path = display_path(app);
    let verify = ctx
        .run(&["codesign", "--verify", "--deep", "--strict", &path], TimeoutClass::Quick)
        .await;
    let (signature, detail) = match verify.into_output() {
        Ok(output) => classify_verification(output.exit_code, &output.stderr),
        Err(e) => {
            let message = e.to_string();
            out.record_error(format!("codesign --verify {}", path), &message);
            (SignatureStatus::Unknown, message)
        }
    };

    let display = ctx
        .run(&["codesign", "-d", "--entitlements", ":-", &path], TimeoutClass::Quick)
        .await;
    let entitlements = match display.into_output() {
        Ok(output) if output.success() => risky_entitlements(&output.stdout),
        // Unsigned bundles have nothing to display.
        Ok(_) => Vec::new(),
        Err(e) => {
            out.record_error(format!("codesign -d {}", path), e);
            Vec::new()
        }
    };

    AppEntitlements {
        application: app
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path,
        signature,
        detail,
        entitlements,
    }
}

/// codesign exits 1 when verification fails and 3 when a requirement is
/// unsatisfied; anything else nonzero is a usage or internal error.
pub fn classify_verification(exit_code: i32, stderr: &str) -> (SignatureStatus, String) {
    let detail = stderr.trim().to_string();
    match exit_code {
        0 => (SignatureStatus::Signed, detail),
        1 | 3 => (SignatureStatus::Unsigned, detail),
        _ => (SignatureStatus::Unknown, detail),
    }
}

/// Risky keys present in an entitlements plist.
pub fn risky_entitlements(plist: &str) -> Vec<RiskyEntitlement> {
    RISKY_ENTITLEMENTS
        .iter()
        .filter(|(key, _, _)| plist.contains(&format!("<key>{}</key>", key)))
        .map(|(key, name, level)| RiskyEntitlement {
            entitlement: key.to_string(),
            name: name.to_string(),
            risk_level: *level,
        })
        .collect()
}
