use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{RecordCounter, ScanBuilder, ScanRecord, StartupItem};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "startup_items",
    scan_type: "Unusual_Startup_Items",
    display_name: "Unusual Startup Items",
    budget: TimeoutClass::Quick,
};

const COUNTERS: &[RecordCounter] = &[
    ("suspicious", |r| matches!(r, ScanRecord::StartupItem(i) if i.suspicious)),
];

const SYSTEM_DIRS: &[&str] = &[
    "/Library/StartupItems",
    "/System/Library/StartupItems",
    "/Library/LaunchAgents",
    "/Library/LaunchDaemons",
];

const USER_DIRS: &[&str] = &["Library/LaunchAgents", "Library/LaunchDaemons"];

pub struct StartupItemsScanner;

/// Entry names directly inside `dir`, sorted.
pub(crate) async fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Property lists installed outside `/System` are what third parties use to
/// get themselves launched.
pub fn is_suspicious(dir: &Path, name: &str) -> bool {
    name.ends_with(".plist") && !dir.starts_with("/System")
}

fn startup_dirs(ctx: &ScanContext) -> Vec<PathBuf> {
    SYSTEM_DIRS
        .iter()
        .map(PathBuf::from)
        .chain(USER_DIRS.iter().map(|rel| ctx.home(rel)))
        .collect()
}

#[async_trait]
impl Scanner for StartupItemsScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        for dir in startup_dirs(ctx) {
            let location = display_path(&dir);
            let names = match list_dir(&dir).await {
                Ok(names) => names,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    out.record_error(location, e);
                    continue;
                }
            };
            for name in names {
                out.push(ScanRecord::StartupItem(StartupItem {
                    suspicious: is_suspicious(&dir, &name),
                    path: display_path(&dir.join(&name)),
                    location: location.clone(),
                    name,
                }));
            }
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scans::run_scanner;
    use crate::scans::testing::{context, ScriptedExecutor};

    #[test]
    fn test_is_suspicious() {
        assert!(is_suspicious(Path::new("/Library/LaunchAgents"), "com.vendor.agent.plist"));
        assert!(!is_suspicious(Path::new("/System/Library/StartupItems"), "com.apple.x.plist"));
        assert!(!is_suspicious(Path::new("/Library/StartupItems"), "LegacyItem"));
    }

    #[tokio::test]
    async fn test_user_launch_agents_listed() {
        let home = tempfile::tempdir().unwrap();
        let agents = home.path().join("Library/LaunchAgents");
        std::fs::create_dir_all(&agents).unwrap();
        std::fs::write(agents.join("com.example.updater.plist"), "<plist/>").unwrap();
        std::fs::write(agents.join("notes.txt"), "").unwrap();

        let ctx = context(ScriptedExecutor::new()).with_home(home.path());
        let result = run_scanner(&StartupItemsScanner, &ctx).await;
        let user_items: Vec<_> = result
            .results
            .iter()
            .filter_map(|r| match r {
                ScanRecord::StartupItem(item) if item.location == display_path(&agents) => Some(item),
                _ => None,
            })
            .collect();
        assert_eq!(user_items.len(), 2);
        assert_eq!(user_items[0].name, "com.example.updater.plist");
        assert!(user_items[0].suspicious);
        assert!(!user_items[1].suspicious);
    }
}
