use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::errors::GuardError;
use crate::models::{ExploitReference, RecordCounter, ScanBuilder, ScanRecord, SoftwareExposure};
use super::parse::{lines, Unparsed};
use super::unsigned::list_app_bundles;
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "vulnerable_software",
    scan_type: "Vulnerability_Scan",
    display_name: "Vulnerability Scan",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("affected_software", |r| matches!(r, ScanRecord::Software(s) if !s.exploits.is_empty())),
];

pub const EXPLOIT_URL_BASE: &str = "https://www.exploit-db.com/exploits/";
const MAX_EXPLOITS_PER_SOFTWARE: usize = 20;
const APP_DIRS: &[&str] = &["/Applications", "/System/Applications"];

pub struct VulnerableSoftwareScanner;

/// One row of the Exploit-DB index.
#[derive(Debug, Clone)]
pub struct ExploitEntry {
    pub id: String,
    pub title: String,
    title_lower: String,
}

impl ExploitEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self { id: id.into(), title_lower: title.to_lowercase(), title }
    }

    fn reference(&self) -> ExploitReference {
        ExploitReference {
            id: self.id.clone(),
            title: self.title.clone(),
            url: format!("{}{}", EXPLOIT_URL_BASE, self.id),
            vulnerable_versions: extract_versions(&self.title),
        }
    }
}

#[async_trait]
impl Scanner for VulnerableSoftwareScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let exploits = match load_exploit_db(&ctx.exploit_db).await {
            Ok((exploits, unparsed)) => {
                out.note("exploit_entries", exploits.len().to_string());
                unparsed.report(out, "exploit database");
                exploits
            }
            Err(e) => {
                out.record_error("exploit database", e);
                Vec::new()
            }
        };

        let mut inventory: Vec<(String, String, &'static str)> = Vec::new();
        let app_dirs = APP_DIRS
            .iter()
            .map(PathBuf::from)
            .chain(std::iter::once(ctx.home("Applications")));
        for dir in app_dirs {
            let apps = match list_app_bundles(&dir).await {
                Ok(apps) => apps,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    out.record_error(display_path(&dir), e);
                    continue;
                }
            };
            for app in apps {
                if let Some(version) = bundle_version(ctx, &app).await {
                    let name = app.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
                    inventory.push((name, version, "application"));
                }
            }
        }

        match ctx.output(&["brew", "list", "--versions"]).await {
            Ok(output) if output.success() => {
                let (packages, unparsed) = parse_brew_versions(&output.stdout);
                unparsed.report(out, "brew list");
                inventory.extend(packages.into_iter().map(|(n, v)| (n, v, "homebrew")));
            }
            Ok(output) => out.record_error("brew list", output.stderr.trim()),
            Err(e) => tracing::debug!(error = %e, "Homebrew not available"),
        }

        for (name, version, source) in inventory {
            let exploits = match_exploits(&name, &exploits);
            out.push(ScanRecord::Software(SoftwareExposure {
                name,
                version,
                source: source.to_string(),
                exploits,
            }));
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

async fn load_exploit_db(path: &Path) -> Result<(Vec<ExploitEntry>, Unparsed), GuardError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(parse_exploit_csv(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(GuardError::NotFound(format!(
            "Exploit-DB index not found at {}",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// `CFBundleShortVersionString`, falling back to `CFBundleVersion`.
async fn bundle_version(ctx: &ScanContext, app: &Path) -> Option<String> {
    if !tokio::fs::try_exists(app.join("Contents/Info.plist")).await.unwrap_or(false) {
        return None;
    }
    let info = display_path(&app.join("Contents/Info"));
    for key in ["CFBundleShortVersionString", "CFBundleVersion"] {
        if let Ok(output) = ctx.output(&["defaults", "read", &info, key]).await {
            let version = output.stdout.trim();
            if output.success() && !version.is_empty() {
                return Some(version.to_string());
            }
        }
    }
    None
}

/// Split CSV text into records, honoring double quotes and `""` escapes.
/// A quoted field may span lines; an unterminated quote runs to the end.
pub fn split_csv_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }
    records
}

/// Rows of `files_exploits.csv`: column 0 is the id, column 2 the title.
/// Rows without a numeric id or a title are counted, not silently dropped.
pub fn parse_exploit_csv(text: &str) -> (Vec<ExploitEntry>, Unparsed) {
    let mut entries = Vec::new();
    let mut unparsed = Unparsed::new();
    for (index, record) in split_csv_records(text).into_iter().enumerate() {
        let id = record.first().map(|f| f.trim()).unwrap_or_default();
        if record.iter().all(|f| f.trim().is_empty()) || (index == 0 && id == "id") {
            continue;
        }
        let title = record.get(2).map(|f| f.trim()).unwrap_or_default();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) || title.is_empty() {
            unparsed.note(&record.join(","));
            continue;
        }
        entries.push(ExploitEntry::new(id, title));
    }
    (entries, unparsed)
}

/// `name version [version...]`; the first listed version is used.
pub fn parse_brew_versions(text: &str) -> (Vec<(String, String)>, Unparsed) {
    let mut packages = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(name), Some(version)) => packages.push((name.to_string(), version.to_string())),
            _ => unparsed.note(line),
        }
    }
    (packages, unparsed)
}

fn is_word_match(haystack: &str, needle: &str) -> bool {
    let boundary = |c: Option<char>| c.map(|c| !c.is_alphanumeric()).unwrap_or(true);
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        boundary(before) && boundary(after)
    })
}

/// Exploits whose title mentions `name` as a whole word, case-insensitively.
pub fn match_exploits(name: &str, exploits: &[ExploitEntry]) -> Vec<ExploitReference> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    exploits
        .iter()
        .filter(|e| is_word_match(&e.title_lower, &needle))
        .take(MAX_EXPLOITS_PER_SOFTWARE)
        .map(ExploitEntry::reference)
        .collect()
}

/// Affected version ranges as stated in an exploit title.
pub fn extract_versions(title: &str) -> Vec<String> {
    let after = |marker: &str| {
        title
            .split_once(marker)
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map(str::to_string)
    };
    if let Some(v) = after("<= ") {
        return vec![format!("Version {} and below", v)];
    }
    if let Some(v) = after("< ") {
        return vec![format!("Below version {}", v)];
    }
    title
        .split_whitespace()
        .find(|w| w.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
        .map(|v| vec![format!("Version {}", v)])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scans::run_scanner;
    use crate::scans::testing::{context, ScriptedExecutor};
    use crate::scans::ScanContext;
    use crate::config::ScanConfig;
    use std::sync::Arc;

    const CSV: &str = "id,file,description,date_published,author,type,platform,port
1001,exploits/macos/local/1001.txt,\"Mozilla Firefox < 115.2 - Use After Free\",2023-09-01,someone,local,macos,
1002,exploits/multiple/remote/1002.py,\"Wget <= 1.20.3 - Arbitrary File Write\",2020-01-01,other,remote,multiple,
1003,exploits/linux/local/1003.c,\"Firefoxy Helper 2.0 - Privilege Escalation\",2021-01-01,x,local,linux,
";

    #[test]
    fn test_split_csv_records_quotes() {
        assert_eq!(
            split_csv_records("1,\"a, \"\"b\"\"\",c\r\n2,d,e"),
            vec![vec!["1", "a, \"b\"", "c"], vec!["2", "d", "e"]]
        );
    }

    #[test]
    fn test_quoted_newline_stays_in_one_record() {
        let text = "1,x,\"Line one\nline two\",y\n2,z,Plain,w\n";
        let records = split_csv_records(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][2], "Line one\nline two");
        assert_eq!(records[1][0], "2");
    }

    #[test]
    fn test_multiline_title_row_is_kept() {
        let text = format!(
            "{}1004,exploits/macos/local/1004.txt,\"Safari 16.1 - Heap Overflow\n(second line)\",2023-01-01,a,local,macos,\n",
            CSV
        );
        let (entries, unparsed) = parse_exploit_csv(&text);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].id, "1004");
        assert!(entries[3].title.starts_with("Safari 16.1"));
        assert_eq!(unparsed.count(), 0);
    }

    #[test]
    fn test_malformed_rows_are_counted() {
        let text = format!("{}abc,nope,Title\n1005,only-two\n", CSV);
        let (entries, unparsed) = parse_exploit_csv(&text);
        assert_eq!(entries.len(), 3);
        assert_eq!(unparsed.count(), 2);
    }

    #[test]
    fn test_parse_exploit_csv_skips_header() {
        let (entries, unparsed) = parse_exploit_csv(CSV);
        assert_eq!(unparsed.count(), 0);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "1001");
        assert_eq!(entries[1].title, "Wget <= 1.20.3 - Arbitrary File Write");
    }

    #[test]
    fn test_match_is_whole_word() {
        let (entries, _) = parse_exploit_csv(CSV);
        let matches = match_exploits("firefox", &entries);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "https://www.exploit-db.com/exploits/1001");
        assert_eq!(matches[0].vulnerable_versions, vec!["Below version 115.2"]);
    }

    #[test]
    fn test_extract_versions() {
        assert_eq!(extract_versions("Wget <= 1.20.3 - Write"), vec!["Version 1.20.3 and below"]);
        assert_eq!(extract_versions("Tool 2.0 - Crash"), vec!["Version 2.0"]);
        assert!(extract_versions("Generic Bug").is_empty());
    }

    #[tokio::test]
    async fn test_homebrew_packages_matched() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("files_exploits.csv");
        std::fs::write(&csv, CSV).unwrap();

        let executor = ScriptedExecutor::new().stdout("brew list --versions", "wget 1.20.1\njq 1.7.1\n");
        let ctx = ScanContext::new(Arc::new(executor), ScanConfig::default(), csv)
            .with_home(dir.path().join("home"))
            .without_geolocation();
        let result = run_scanner(&VulnerableSoftwareScanner, &ctx).await;
        assert_eq!(result.summary.counts["affected_software"], 1);
        assert_eq!(result.summary.notes["exploit_entries"], "3");
    }

    #[tokio::test]
    async fn test_skipped_exploit_rows_reach_errors() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("files_exploits.csv");
        std::fs::write(&csv, format!("{}not-a-row\n", CSV)).unwrap();

        let ctx = ScanContext::new(Arc::new(ScriptedExecutor::new()), ScanConfig::default(), csv)
            .with_home(dir.path().join("home"))
            .without_geolocation();
        let result = run_scanner(&VulnerableSoftwareScanner, &ctx).await;
        assert_eq!(result.summary.notes["exploit_entries"], "3");
        assert!(result
            .errors
            .iter()
            .any(|e| e.context == "exploit database: unparsed output"));
    }

    #[tokio::test]
    async fn test_missing_database_is_recorded() {
        let result = run_scanner(&VulnerableSoftwareScanner, &context(ScriptedExecutor::new())).await;
        assert!(result.errors.iter().any(|e| e.context == "exploit database"));
    }
}
