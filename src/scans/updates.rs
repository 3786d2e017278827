use std::time::Instant;

use async_trait::async_trait;

use crate::models::{RecordCounter, ScanBuilder, ScanRecord, SoftwareUpdate};
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "security_updates",
    scan_type: "Security_Update_Status",
    display_name: "Security Update Status",
    budget: TimeoutClass::Long,
};

pub const UP_TO_DATE: &str = "Up To Date";
pub const UPDATES_AVAILABLE: &str = "Updates Available";
pub const UNKNOWN: &str = "Unknown";

const COUNTERS: &[RecordCounter] = &[
    ("system_updates", |r| matches!(r, ScanRecord::SoftwareUpdate(u) if u.source == "softwareupdate")),
    ("homebrew_updates", |r| matches!(r, ScanRecord::SoftwareUpdate(u) if u.source == "homebrew")),
];

pub struct UpdatesScanner;

#[async_trait]
impl Scanner for UpdatesScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        match ctx.output(&["sw_vers", "-productVersion"]).await {
            Ok(output) if output.success() => out.note("os_version", output.stdout.trim()),
            Ok(output) => out.record_error("sw_vers", output.stderr.trim()),
            Err(e) => out.record_error("sw_vers", e),
        }

        // softwareupdate contacts Apple's catalog and can take minutes.
        let system = match ctx.run(&["softwareupdate", "-l"], TimeoutClass::Long).await.into_output() {
            Ok(output) => {
                let combined = format!("{}\n{}", output.stdout, output.stderr);
                let (updates, status) = parse_softwareupdate(&combined);
                if status.is_none() {
                    out.record_error("softwareupdate -l", "output listed neither updates nor an up-to-date notice");
                }
                out.extend(updates.into_iter().map(ScanRecord::SoftwareUpdate));
                status
            }
            Err(e) => {
                out.record_error("softwareupdate -l", e);
                None
            }
        };

        match ctx.run(&["brew", "outdated", "--verbose"], TimeoutClass::Long).await.into_output() {
            Ok(output) if output.success() => {
                let (updates, unparsed) = parse_brew_outdated(&output.stdout);
                unparsed.report(out, "brew outdated");
                out.extend(updates.into_iter().map(ScanRecord::SoftwareUpdate));
            }
            Ok(output) => out.record_error("brew outdated", output.stderr.trim()),
            // Homebrew is optional.
            Err(e) => tracing::debug!(error = %e, "Homebrew not available"),
        }

        let overall = match system {
            Some(true) => UPDATES_AVAILABLE,
            Some(false) if out.records().is_empty() => UP_TO_DATE,
            Some(false) => UPDATES_AVAILABLE,
            None => UNKNOWN,
        };
        out.set_overall_status(overall);
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// Pending updates, plus `Some(true)` when updates were listed,
/// `Some(false)` on the up-to-date notice and `None` when neither appeared.
pub fn parse_softwareupdate(text: &str) -> (Vec<SoftwareUpdate>, Option<bool>) {
    let mut updates: Vec<SoftwareUpdate> = Vec::new();
    let mut up_to_date = false;
    for line in lines(text) {
        if line.contains("No new software available") {
            up_to_date = true;
        } else if let Some(label) = line.strip_prefix("* Label:") {
            updates.push(SoftwareUpdate {
                source: "softwareupdate".into(),
                name: label.trim().to_string(),
                detail: String::new(),
            });
        } else if line.starts_with("Title:") {
            if let Some(last) = updates.last_mut() {
                last.detail = line.to_string();
            }
        }
    }
    let status = if !updates.is_empty() {
        Some(true)
    } else if up_to_date {
        Some(false)
    } else {
        None
    };
    (updates, status)
}

/// `brew outdated --verbose` lines: `name (installed) < latest`.
pub fn parse_brew_outdated(text: &str) -> (Vec<SoftwareUpdate>, Unparsed) {
    let mut updates = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        match line.split_once(' ') {
            Some((name, rest)) if rest.contains('<') || rest.contains("!=") => updates.push(SoftwareUpdate {
                source: "homebrew".into(),
                name: name.to_string(),
                detail: rest.trim().to_string(),
            }),
            _ => unparsed.note(line),
        }
    }
    (updates, unparsed)
}
