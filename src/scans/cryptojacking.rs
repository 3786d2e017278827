use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{MiningIndicator, MiningIndicatorKind, RecordCounter, ScanBuilder, ScanRecord};
use super::parse::Unparsed;
use super::processes::parse_ps_aux;
use super::walk::{walk_files, WalkReport};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "cryptojacking",
    scan_type: "Cryptojacking_Scan",
    display_name: "Cryptojacking Scan",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("high_cpu_process", |r| matches!(r, ScanRecord::MiningIndicator(i) if i.indicator == MiningIndicatorKind::HighCpuProcess)),
    ("miner_process", |r| matches!(r, ScanRecord::MiningIndicator(i) if i.indicator == MiningIndicatorKind::MinerProcess)),
    ("miner_file", |r| matches!(r, ScanRecord::MiningIndicator(i) if i.indicator == MiningIndicatorKind::MinerFile)),
    ("browser_miner", |r| matches!(r, ScanRecord::MiningIndicator(i) if i.indicator == MiningIndicatorKind::BrowserMiner)),
];

pub const MINER_NAMES: &[&str] = &["xmrig", "minerd", "cpuminer", "ccminer", "xmr-stak", "nicehash", "coinhive", "jsecoin"];
/// Strings embedded by in-browser mining scripts.
pub const BROWSER_MINER_MARKERS: &[&str] = &["coinhive", "coin-hive", "cryptonight", "jsecoin", "crypto-loot"];
pub const HIGH_CPU_PERCENT: f32 = 50.0;
const CPU_EXEMPT: &[&str] = &["kernel_task", "WindowServer"];
const BINARY_ROOTS: &[&str] = &["/usr/local", "/opt", "/Library"];
const EXTENSION_DIRS: &[&str] = &[
    "Library/Application Support/Google/Chrome/Default/Extensions",
    "Library/Application Support/BraveSoftware/Brave-Browser/Default/Extensions",
    "Library/Application Support/Firefox/Profiles",
    "Library/Safari/Extensions",
];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "json", "html", "htm"];
const MAX_SCRIPT_BYTES: u64 = 2 * 1024 * 1024;

pub struct CryptojackingScanner {
    /// Trees searched for miner binaries by file name.
    pub binary_roots: Vec<PathBuf>,
}

impl Default for CryptojackingScanner {
    fn default() -> Self {
        Self { binary_roots: BINARY_ROOTS.iter().map(PathBuf::from).collect() }
    }
}

#[async_trait]
impl Scanner for CryptojackingScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, deadline: Instant) {
        match ctx.output(&["ps", "aux"]).await {
            Ok(output) => {
                let (indicators, unparsed) = process_indicators(&output.stdout);
                unparsed.report(out, "ps aux");
                out.extend(indicators.into_iter().map(ScanRecord::MiningIndicator));
            }
            Err(e) => out.record_error("ps aux", e),
        }

        let roots = self.binary_roots.clone();
        let max_records = ctx.settings.max_file_records;
        match tokio::task::spawn_blocking(move || find_miner_files(&roots, max_records, deadline)).await {
            Ok((indicators, report)) => {
                report.record(out, "miner file search");
                out.extend(indicators.into_iter().map(ScanRecord::MiningIndicator));
            }
            Err(e) => out.record_error("miner file search", e),
        }

        let extension_dirs: Vec<PathBuf> = EXTENSION_DIRS.iter().map(|d| ctx.home(d)).collect();
        match tokio::task::spawn_blocking(move || find_browser_miners(&extension_dirs, max_records, deadline)).await {
            Ok((indicators, report)) => {
                report.record(out, "browser extensions");
                out.extend(indicators.into_iter().map(ScanRecord::MiningIndicator));
            }
            Err(e) => out.record_error("browser extensions", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

fn miner_name(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    MINER_NAMES.iter().copied().find(|name| lower.contains(name))
}

/// Known miner binaries and anything above the CPU threshold.
pub fn process_indicators(ps_output: &str) -> (Vec<MiningIndicator>, Unparsed) {
    let (processes, unparsed) = parse_ps_aux(ps_output);
    let mut indicators = Vec::new();
    for process in processes {
        let executable = process.command.split_whitespace().next().unwrap_or_default();
        let base = executable.rsplit('/').next().unwrap_or(executable);
        let subject = format!("{} (pid {})", base, process.pid);
        if let Some(miner) = miner_name(base) {
            indicators.push(MiningIndicator {
                indicator: MiningIndicatorKind::MinerProcess,
                subject,
                detail: format!("matches known miner {}", miner),
            });
        } else if process.cpu_percent > HIGH_CPU_PERCENT && !CPU_EXEMPT.contains(&base) {
            indicators.push(MiningIndicator {
                indicator: MiningIndicatorKind::HighCpuProcess,
                subject,
                detail: format!("{:.1}% CPU", process.cpu_percent),
            });
        }
    }
    (indicators, unparsed)
}

/// Files under `roots` whose name contains a known miner name.
pub fn find_miner_files(roots: &[PathBuf], max_records: usize, deadline: Instant) -> (Vec<MiningIndicator>, WalkReport) {
    let mut indicators = Vec::new();
    let mut total = WalkReport::default();
    for root in roots {
        if !root.exists() || indicators.len() >= max_records {
            continue;
        }
        let report = walk_files(root, deadline, &[], false, |path, _| {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if let Some(miner) = miner_name(&name) {
                indicators.push(MiningIndicator {
                    indicator: MiningIndicatorKind::MinerFile,
                    subject: display_path(path),
                    detail: format!("file name matches {}", miner),
                });
            }
            indicators.len() < max_records
        });
        total.merge(report);
    }
    (indicators, total)
}

fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SCRIPT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Extension scripts that embed an in-browser miner.
pub fn find_browser_miners(dirs: &[PathBuf], max_records: usize, deadline: Instant) -> (Vec<MiningIndicator>, WalkReport) {
    let mut indicators = Vec::new();
    let mut total = WalkReport::default();
    for dir in dirs {
        if !dir.exists() || indicators.len() >= max_records {
            continue;
        }
        let mut unreadable = 0usize;
        let mut report = walk_files(dir, deadline, &[], false, |path, meta| {
            if !is_script(path) || meta.len() > MAX_SCRIPT_BYTES {
                return true;
            }
            match std::fs::read(path) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).to_lowercase();
                    if let Some(marker) = BROWSER_MINER_MARKERS.iter().find(|m| text.contains(*m)) {
                        indicators.push(MiningIndicator {
                            indicator: MiningIndicatorKind::BrowserMiner,
                            subject: display_path(path),
                            detail: format!("references {}", marker),
                        });
                    }
                }
                Err(_) => unreadable += 1,
            }
            indicators.len() < max_records
        });
        report.unreadable += unreadable;
        total.merge(report);
    }
    (indicators, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::scans::run_scanner;
    use crate::scans::testing::ScriptedExecutor;
    use crate::scans::ScanContext;
    use std::sync::Arc;
    use std::time::Duration;

    const PS: &str = "USER               PID  %CPU %MEM      VSZ    RSS   TT  STAT STARTED      TIME COMMAND
alice             4242  97.0  3.1 36000000 500000   ??  R    9:00AM  51:02.03 /tmp/.hidden/xmrig -o pool:3333
root               100  88.0  0.5 34000000  12000   ??  Rs   8:00AM   9:10.00 /System/Library/Frameworks/kernel_task
alice              555  72.5  1.5 35000000  80000   ??  R    9:01AM   3:01.00 /usr/local/bin/ffmpeg -i in.mov out.mp4
alice              556   1.0  0.5 35000000  80000   ??  S    9:01AM   0:01.00 /usr/bin/crypto-helper
";

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[test]
    fn test_process_indicators() {
        let (indicators, unparsed) = process_indicators(PS);
        assert_eq!(unparsed.count(), 0);
        assert_eq!(indicators.len(), 2);
        assert_eq!(indicators[0].indicator, MiningIndicatorKind::MinerProcess);
        assert_eq!(indicators[0].subject, "xmrig (pid 4242)");
        assert_eq!(indicators[1].indicator, MiningIndicatorKind::HighCpuProcess);
        assert_eq!(indicators[1].detail, "72.5% CPU");
    }

    #[test]
    fn test_miner_files_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/xmrig-6.20"), "").unwrap();
        std::fs::write(dir.path().join("bin/libcrypto.dylib"), "").unwrap();
        let (indicators, report) = find_miner_files(&[dir.path().to_path_buf()], 100, later());
        assert_eq!(indicators.len(), 1);
        assert!(indicators[0].subject.ends_with("xmrig-6.20"));
        assert_eq!(report.files_seen, 2);
    }

    #[test]
    fn test_browser_miner_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let ext = dir.path().join("abcdef/1.0");
        std::fs::create_dir_all(&ext).unwrap();
        std::fs::write(ext.join("bg.js"), "var miner = new CoinHive.Anonymous('key');").unwrap();
        std::fs::write(ext.join("clean.js"), "console.log('hi')").unwrap();
        std::fs::write(ext.join("coinhive.png"), "coinhive").unwrap();
        let (indicators, _) = find_browser_miners(&[dir.path().to_path_buf()], 100, later());
        assert_eq!(indicators.len(), 1);
        assert!(indicators[0].subject.ends_with("bg.js"));
        assert_eq!(indicators[0].detail, "references coinhive");
    }

    #[tokio::test]
    async fn test_scan_collects_from_home_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let ext = dir.path().join("Library/Safari/Extensions/Miner");
        std::fs::create_dir_all(&ext).unwrap();
        std::fs::write(ext.join("inject.js"), "load('https://coin-hive.com/lib.js')").unwrap();

        let executor = ScriptedExecutor::new().stdout("ps aux", PS);
        let ctx = ScanContext::new(Arc::new(executor), ScanConfig::default(), "/nonexistent".into())
            .with_home(dir.path())
            .without_geolocation();
        let scanner = CryptojackingScanner { binary_roots: Vec::new() };
        let result = run_scanner(&scanner, &ctx).await;
        assert_eq!(result.summary.counts["miner_process"], 1);
        assert_eq!(result.summary.counts["high_cpu_process"], 1);
        assert_eq!(result.summary.counts["browser_miner"], 1);
    }
}
