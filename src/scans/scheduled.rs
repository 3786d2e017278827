use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{RecordCounter, ScanBuilder, ScanRecord, ScheduledTask};
use super::parse::lines;
use super::startup::list_dir;
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "scheduled_tasks",
    scan_type: "Scheduled_Tasks",
    display_name: "Scheduled Tasks Check",
    budget: TimeoutClass::Long,
};

pub const SOURCE_LAUNCHD: &str = "launchd";
pub const SOURCE_USER_CRONTAB: &str = "user_crontab";
pub const SOURCE_SYSTEM_CRONTAB: &str = "system_crontab";
pub const SOURCE_PERIODIC: &str = "periodic";
pub const SOURCE_LOGIN_ITEM: &str = "login_item";

const COUNTERS: &[RecordCounter] = &[
    (SOURCE_LAUNCHD, |r| matches!(r, ScanRecord::ScheduledTask(t) if t.source == SOURCE_LAUNCHD)),
    (SOURCE_USER_CRONTAB, |r| matches!(r, ScanRecord::ScheduledTask(t) if t.source == SOURCE_USER_CRONTAB)),
    (SOURCE_SYSTEM_CRONTAB, |r| matches!(r, ScanRecord::ScheduledTask(t) if t.source == SOURCE_SYSTEM_CRONTAB)),
    (SOURCE_PERIODIC, |r| matches!(r, ScanRecord::ScheduledTask(t) if t.source == SOURCE_PERIODIC)),
    (SOURCE_LOGIN_ITEM, |r| matches!(r, ScanRecord::ScheduledTask(t) if t.source == SOURCE_LOGIN_ITEM)),
];

const PERIODS: &[&str] = &["daily", "weekly", "monthly"];
const LOGIN_ITEMS_SCRIPT: &str = "tell application \"System Events\" to get the name of every login item";

pub struct ScheduledTasksScanner;

fn task(source: &str, name: impl Into<String>, detail: impl Into<String>) -> ScanRecord {
    ScanRecord::ScheduledTask(ScheduledTask {
        source: source.to_string(),
        name: name.into(),
        detail: detail.into(),
    })
}

#[async_trait]
impl Scanner for ScheduledTasksScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let launchd_dirs = [
            PathBuf::from("/Library/LaunchDaemons"),
            PathBuf::from("/Library/LaunchAgents"),
            ctx.home("Library/LaunchAgents"),
            ctx.home("Library/LaunchDaemons"),
        ];
        for dir in &launchd_dirs {
            match list_dir(dir).await {
                Ok(names) => out.extend(
                    names
                        .into_iter()
                        .filter(|n| n.ends_with(".plist"))
                        .map(|n| task(SOURCE_LAUNCHD, n, display_path(dir))),
                ),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => out.record_error(display_path(dir), e),
            }
        }

        match ctx.output(&["crontab", "-l"]).await {
            Ok(output) if output.success() => out.extend(
                parse_crontab(&output.stdout)
                    .into_iter()
                    .map(|entry| task(SOURCE_USER_CRONTAB, entry, "crontab -l")),
            ),
            // crontab exits non-zero with "no crontab for <user>" when empty.
            Ok(output) if output.stderr.contains("no crontab") => {}
            Ok(output) => out.record_error("crontab -l", output.stderr.trim()),
            Err(e) => out.record_error("crontab -l", e),
        }

        match read_optional(Path::new("/etc/crontab")).await {
            Ok(Some(text)) => out.extend(
                parse_crontab(&text)
                    .into_iter()
                    .map(|entry| task(SOURCE_SYSTEM_CRONTAB, entry, "/etc/crontab")),
            ),
            Ok(None) => {}
            Err(e) => out.record_error("/etc/crontab", e),
        }

        for period in PERIODS {
            let dir = Path::new("/etc/periodic").join(period);
            match list_dir(&dir).await {
                Ok(names) => out.extend(names.into_iter().map(|n| task(SOURCE_PERIODIC, n, *period))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => out.record_error(display_path(&dir), e),
            }
        }

        match ctx.output(&["osascript", "-e", LOGIN_ITEMS_SCRIPT]).await {
            Ok(output) if output.success() => out.extend(
                parse_login_items(&output.stdout)
                    .into_iter()
                    .map(|name| task(SOURCE_LOGIN_ITEM, name, "System Events")),
            ),
            Ok(output) => out.record_error("login items", output.stderr.trim()),
            Err(e) => out.record_error("login items", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Schedule lines, skipping comments and variable assignments.
pub fn parse_crontab(text: &str) -> Vec<String> {
    lines(text)
        .filter(|l| !l.starts_with('#'))
        .filter(|l| {
            let first = l.split_whitespace().next().unwrap_or("");
            !(first.contains('=') && !first.starts_with('@'))
        })
        .map(str::to_string)
        .collect()
}

/// osascript prints list values comma-separated on one line.
pub fn parse_login_items(text: &str) -> Vec<String> {
    text.trim()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
