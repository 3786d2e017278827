use std::sync::LazyLock;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::models::{RecordCounter, ScanBuilder, ScanRecord, Snapshot};
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "snapshots",
    scan_type: "Snapshot_Analysis",
    display_name: "Time Machine Snapshot Analysis",
    budget: TimeoutClass::Quick,
};

const COUNTERS: &[RecordCounter] = &[("recent", |r| matches!(r, ScanRecord::Snapshot(s) if s.recent))];

static SNAPSHOT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2}-\d{6})").expect("valid regex"));

pub struct SnapshotScanner;

#[async_trait]
impl Scanner for SnapshotScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        match ctx.output(&["tmutil", "listlocalsnapshots", "/"]).await {
            Ok(output) => {
                let window = Duration::days(ctx.settings.recent_snapshot_days);
                let (snapshots, unparsed) = parse_snapshots(&output.stdout, Utc::now(), window);
                out.extend(snapshots.into_iter().map(ScanRecord::Snapshot));
                unparsed.report(out, "tmutil listlocalsnapshots");
            }
            Err(e) => out.record_error("tmutil listlocalsnapshots", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

pub fn parse_snapshots(text: &str, now: DateTime<Utc>, window: Duration) -> (Vec<Snapshot>, Unparsed) {
    let mut snapshots = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        if line.starts_with("Snapshots for") {
            continue;
        }
        if !line.starts_with("com.apple.TimeMachine") {
            unparsed.note(line);
            continue;
        }
        let created = SNAPSHOT_DATE
            .captures(line)
            .and_then(|caps| NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d-%H%M%S").ok())
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc));
        snapshots.push(Snapshot {
            name: line.to_string(),
            recent: created.map(|c| now - c <= window).unwrap_or(false),
            created,
        });
    }
    (snapshots, unparsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshots_recency() {
        let recent_name = Local::now().format("com.apple.TimeMachine.%Y-%m-%d-%H%M%S.local").to_string();
        let text = format!(
            "Snapshots for disk /:\ncom.apple.TimeMachine.2020-01-15-103000.local\n{}\n",
            recent_name
        );
        let (snapshots, unparsed) = parse_snapshots(&text, Utc::now(), Duration::days(7));
        assert_eq!(snapshots.len(), 2);
        assert!(!snapshots[0].recent);
        assert!(snapshots[0].created.is_some());
        assert!(snapshots[1].recent);
        assert_eq!(unparsed.count(), 0);
    }

    #[test]
    fn test_undated_snapshot_is_not_recent() {
        let (snapshots, _) = parse_snapshots("com.apple.TimeMachine.local\n", Utc::now(), Duration::days(7));
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].created.is_none());
        assert!(!snapshots[0].recent);
    }

    #[test]
    fn test_foreign_lines_are_noted() {
        let (snapshots, unparsed) = parse_snapshots("Failed to mount\n", Utc::now(), Duration::days(7));
        assert!(snapshots.is_empty());
        assert_eq!(unparsed.count(), 1);
    }
}
